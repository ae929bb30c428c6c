pub mod document;
pub mod domain;
pub mod ports;
pub mod query;

pub use document::{decode_all, merge_fields, to_fields, Document};
pub use domain::{Account, ClassSession, ClassStatus, ClassType, Role, UnknownRole, UserProfile};
pub use ports::{
    ClientStorage, DocumentStore, ImageCdn, PortError, PortResult, SetOptions, SnapshotStream,
    UploadOptions, UploadedImage,
};
pub use query::{Direction, Filter, FilterOp, OrderBy, Query, WatchTarget};
