pub mod cloud_build;
pub mod composer;
pub mod compute;
pub mod errors;
pub mod storage;
pub mod types;

pub use cloud_build::CloudBuildApi;
pub use composer::ComposerApi;
pub use compute::ComputeApi;
pub use errors::CloudError;
pub use storage::StorageApi;
