pub mod domain;
pub mod ports;

pub use domain::{
    Account, FileKind, Gravity, MediaFile, NewPost, NewProfile, Post, PreviewOptions, Profile,
    ProfileLookup, Query, Session, SessionToken, StoredFile, UnknownFileKind,
};
pub use ports::{AccountService, DatabaseService, PortError, PortResult, StorageService};
