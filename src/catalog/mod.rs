mod index;
mod model;
mod source;

pub use self::index::{CatalogHandle, CatalogInfo, CatalogOptions, MessageCatalog, MessageRef};
pub use self::model::{ByteOrder, MessageDescriptor, SignalDescriptor};
pub use self::source::{CatalogSource, JsonCatalogSource};
