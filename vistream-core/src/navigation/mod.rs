//! Route-driven loading-bar activation and decorated navigation.

pub mod decorator;
pub mod route;
pub mod router;
pub mod trigger;

pub use decorator::NavigateWithLoading;
pub use route::RouteLocation;
pub use router::{MemoryRouter, NavigateOptions, Router};
pub use trigger::NavigationTrigger;
