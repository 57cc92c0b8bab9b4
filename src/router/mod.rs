//! Route patterns, the route table and mountable sub-routers.

pub mod pattern;
pub mod sub;
pub mod table;
pub mod target;

pub use pattern::{Pattern, PatternError, Segment, TrailingSlash, join_paths, prefix_matches};
pub use sub::{MiddlewareDecl, Mount, RouteDecl, RouteSource, Router, Routes};
pub use table::{Route, RouteMatch, RouteTable};
pub use target::Target;
