mod catalog_view;
mod message_view;
mod painter;
mod stats_view;
mod table;

pub(crate) use self::catalog_view::{CatalogView, MessageDetailView};
pub(crate) use self::message_view::{DecodedMessageView, RejectedFrameView};
pub(crate) use self::painter::Painter;
pub(crate) use self::stats_view::StatsView;
pub(crate) use self::table::Table;
