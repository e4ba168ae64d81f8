// Domain layer: models and ports. Concrete process and library bindings live in adapters.

pub mod model;
pub mod ports;
