//! Ring catalog, ring membership tracking and navigation

pub mod host;
pub mod messages;
pub mod model;
pub mod navigator;
pub mod registry;

pub use host::{IconSink, IconState, PanelSink, Tab, TabControl, TabId};
pub use messages::{DataUpdate, PanelMessage, PanelRequest, RingAction};
pub use model::{RingDefinition, RingEntry};
pub use navigator::{
    BLANK_PAGE, NavigationTarget, NavigatorError, NavigatorHost, NavigatorPhase, RingNavigator,
    sanitize_location, step_index,
};
pub use registry::{REGISTRY_ID_PROPERTY, RING_ID_PROPERTY, RingRegistry};
