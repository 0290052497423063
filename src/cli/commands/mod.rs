mod init;
mod publish;

pub use init::cmd_init;
pub use publish::cmd_publish;
