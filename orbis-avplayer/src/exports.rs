//! libSceAvPlayer export table
//!
//! Registers every entry point of [`AvPlayerLibrary`](crate::AvPlayerLibrary)
//! under its fixed NID so the loader can resolve guest imports.

use orbis_common::{SymbolKey, SymbolTable};
use tracing::debug;

pub const LIBRARY_NAME: &str = "libSceAvPlayer";
pub const LIBRARY_VERSION: u16 = 1;
pub const MODULE_VERSION_MAJOR: u8 = 1;
pub const MODULE_VERSION_MINOR: u8 = 0;

/// A guest-callable AvPlayer operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Export {
    AddSource,
    AddSourceEx,
    ChangeStream,
    Close,
    CurrentTime,
    DisableStream,
    EnableStream,
    GetAudioData,
    GetStreamInfo,
    GetVideoData,
    GetVideoDataEx,
    Init,
    InitEx,
    IsActive,
    JumpToTime,
    Pause,
    PostInit,
    Printf,
    Resume,
    SetAvSyncMode,
    SetLogCallback,
    SetLooping,
    SetTrickSpeed,
    Start,
    Stop,
    StreamCount,
    Vprintf,
}

impl Export {
    /// Operations that are accepted but have no effect
    pub fn is_stub(self) -> bool {
        matches!(
            self,
            Export::AddSourceEx
                | Export::ChangeStream
                | Export::JumpToTime
                | Export::Pause
                | Export::Printf
                | Export::Resume
                | Export::SetAvSyncMode
                | Export::SetLogCallback
                | Export::SetLooping
                | Export::SetTrickSpeed
                | Export::Vprintf
        )
    }
}

/// (NID, function name, operation)
pub const EXPORTS: &[(&str, &str, Export)] = &[
    ("KMcEa+rHsIo", "sceAvPlayerAddSource", Export::AddSource),
    ("x8uvuFOPZhU", "sceAvPlayerAddSourceEx", Export::AddSourceEx),
    ("buMCiJftcfw", "sceAvPlayerChangeStream", Export::ChangeStream),
    ("NkJwDzKmIlw", "sceAvPlayerClose", Export::Close),
    ("wwM99gjFf1Y", "sceAvPlayerCurrentTime", Export::CurrentTime),
    ("BOVKAzRmuTQ", "sceAvPlayerDisableStream", Export::DisableStream),
    ("ODJK2sn9w4A", "sceAvPlayerEnableStream", Export::EnableStream),
    ("Wnp1OVcrZgk", "sceAvPlayerGetAudioData", Export::GetAudioData),
    ("d8FcbzfAdQw", "sceAvPlayerGetStreamInfo", Export::GetStreamInfo),
    ("o3+RWnHViSg", "sceAvPlayerGetVideoData", Export::GetVideoData),
    ("JdksQu8pNdQ", "sceAvPlayerGetVideoDataEx", Export::GetVideoDataEx),
    ("aS66RI0gGgo", "sceAvPlayerInit", Export::Init),
    ("o9eWRkSL+M4", "sceAvPlayerInitEx", Export::InitEx),
    ("UbQoYawOsfY", "sceAvPlayerIsActive", Export::IsActive),
    ("XC9wM+xULz8", "sceAvPlayerJumpToTime", Export::JumpToTime),
    ("9y5v+fGN4Wk", "sceAvPlayerPause", Export::Pause),
    ("HD1YKVU26-M", "sceAvPlayerPostInit", Export::PostInit),
    ("agig-iDRrTE", "sceAvPlayerPrintf", Export::Printf),
    ("w5moABNwnRY", "sceAvPlayerResume", Export::Resume),
    ("k-q+xOxdc3E", "sceAvPlayerSetAvSyncMode", Export::SetAvSyncMode),
    ("eBTreZ84JFY", "sceAvPlayerSetLogCallback", Export::SetLogCallback),
    ("OVths0xGfho", "sceAvPlayerSetLooping", Export::SetLooping),
    ("av8Z++94rs0", "sceAvPlayerSetTrickSpeed", Export::SetTrickSpeed),
    ("ET4Gr-Uu07s", "sceAvPlayerStart", Export::Start),
    ("ZC17w3vB5Lo", "sceAvPlayerStop", Export::Stop),
    ("hdTyRzCXQeQ", "sceAvPlayerStreamCount", Export::StreamCount),
    ("yN7Jhuv8g24", "sceAvPlayerVprintf", Export::Vprintf),
];

pub fn symbol_key(nid: &str) -> SymbolKey {
    SymbolKey::new(
        nid,
        LIBRARY_NAME,
        LIBRARY_VERSION,
        LIBRARY_NAME,
        MODULE_VERSION_MAJOR,
        MODULE_VERSION_MINOR,
    )
}

/// Register all libSceAvPlayer exports
pub fn register_exports(table: &mut SymbolTable<Export>) -> orbis_common::Result<()> {
    for &(nid, name, export) in EXPORTS {
        table.register(symbol_key(nid), name, export)?;
    }
    debug!("Registered {} {} exports", EXPORTS.len(), LIBRARY_NAME);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_operation_registered_once() {
        let mut table = SymbolTable::new();
        register_exports(&mut table).unwrap();
        assert_eq!(table.len(), 27);

        let exports: HashSet<Export> = table.iter().map(|(_, record)| record.value).collect();
        assert_eq!(exports.len(), 27);
    }

    #[test]
    fn test_resolve_init_variants() {
        let mut table = SymbolTable::new();
        register_exports(&mut table).unwrap();

        let init = table.resolve(&symbol_key("aS66RI0gGgo")).unwrap();
        assert_eq!(init.name, "sceAvPlayerInit");
        assert_eq!(init.value, Export::Init);
        assert_eq!(table.resolve_nid("o9eWRkSL+M4").unwrap().value, Export::InitEx);
    }

    #[test]
    fn test_second_registration_fails() {
        let mut table = SymbolTable::new();
        register_exports(&mut table).unwrap();
        assert!(register_exports(&mut table).is_err());
    }

    #[test]
    fn test_stub_set() {
        let stubs = EXPORTS.iter().filter(|(_, _, e)| e.is_stub()).count();
        assert_eq!(stubs, 11);
        assert!(!Export::Stop.is_stub());
        assert!(!Export::DisableStream.is_stub());
    }
}
