//! Client for the substrate API sidecar.
mod cli;
mod provider;

pub use self::cli::SidecarArgs;
pub use self::provider::{
    BlockRequest, HeadHeaderRequest, HeaderNumber, HeaderResponse, SidecarError,
    SidecarProvider, SidecarProviderOptions, SidecarRequest,
};
