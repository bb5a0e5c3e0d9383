// Domain layer: catalog and selection models plus the ports (interfaces) the core depends on.

pub mod model;
pub mod ports;
