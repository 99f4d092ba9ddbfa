pub mod mips_share;
pub mod pe;
pub mod provisioner;
pub mod resource_trait;
