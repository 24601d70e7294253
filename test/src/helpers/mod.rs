pub mod assertions;
pub mod test_network;

pub use fixtures::{
    add, camera, catalog, create, gps, item, laptop, phone, realize, rem, screen, three_devices, tv,
};
pub use test_component_manager::{RunningComponent, TestComponentManager};
pub use test_network::{TestNetwork, TestRuntime};
