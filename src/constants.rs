// Page integration constants used by the web frontend.

// Attribute that tags monitored video elements with their source id
pub const SOURCE_ATTR: &str = "data-calm-source";

// HTMLMediaElement.readyState needed before a frame can be drawn
pub const HAVE_CURRENT_DATA: u16 = 2;

// Label reported when the host does not supply one
pub const DEFAULT_PLATFORM_LABEL: &str = "web";

// Scroll listener target event
pub const SCROLL_EVENT: &str = "scroll";

// Canvas context used for downscaled capture
pub const CAPTURE_CONTEXT: &str = "2d";

// Compute shader workgroup width (must match chi_squared.wgsl)
pub const DISTANCE_WORKGROUP_SIZE: u32 = 64;
