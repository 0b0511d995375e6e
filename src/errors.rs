//! Error Types
//!
//! This module defines the error types used throughout the engine.
//!
//! # Overview
//!
//! The main error type [`EmberError`] covers all failure modes including:
//! - GPU initialization failures
//! - Device loss and surface (swapchain) invalidation
//! - Render-target allocation failures
//! - Invalid host-supplied parameters
//!
//! # Propagation policy
//!
//! Surface invalidation (`SwapchainOutOfDate` / `SwapchainSuboptimal`) is
//! recoverable and consumed inside the frame loop by recreating the surface
//! configuration and render targets. Every other variant propagates to the
//! host, which is expected to tear down or re-enter its idle state. Shader
//! compilation and pipeline creation happen at init; a failure there is
//! fatal by construction.

use thiserror::Error;

/// The main error type for the Ember engine.
#[derive(Error, Debug)]
pub enum EmberError {
    // ========================================================================
    // GPU & Device Errors
    // ========================================================================
    /// Failed to request a compatible GPU adapter.
    #[error("Failed to request WGPU adapter: {0}")]
    AdapterRequestFailed(String),

    /// Failed to create the GPU device.
    #[error("Failed to create WGPU device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),

    /// The GPU hung or the driver was reset. Fatal: the host must drain,
    /// recreate the device or terminate.
    #[error("GPU device lost: {0}")]
    DeviceLost(String),

    /// Window system error.
    #[error("Window system error: {0}")]
    WindowError(#[from] raw_window_handle::HandleError),

    // ========================================================================
    // Surface (Swapchain) Errors
    // ========================================================================
    /// The surface no longer matches the window. Recovered locally by
    /// draining in-flight work and recreating surface + render targets
    /// (pipelines survive).
    #[error("Surface out of date")]
    SwapchainOutOfDate,

    /// The surface still works but no longer matches the window optimally.
    /// Handled on the same recovery path as [`Self::SwapchainOutOfDate`].
    #[error("Surface suboptimal")]
    SwapchainSuboptimal,

    /// Acquiring the next surface image did not complete in time. Treated
    /// as device loss after one retry.
    #[error("Timed out waiting for the next surface image")]
    SurfaceTimeout,

    // ========================================================================
    // Resource Errors
    // ========================================================================
    /// Out of device memory during target or buffer creation. If raised
    /// during swapchain recreation the host may retry with a reduced
    /// render-target extent.
    #[error("GPU allocation failure: {0}")]
    AllocationFailure(String),

    // ========================================================================
    // Host Parameter Errors
    // ========================================================================
    /// A host-supplied index or argument is out of range. Programming
    /// error on the caller's side.
    #[error("Invalid parameter: {context} (value: {value})")]
    InvalidParameter {
        /// Description of what was being accessed
        context: &'static str,
        /// The offending value
        value: usize,
    },
}

/// Classifies the result of [`wgpu::Surface::get_current_texture`] into the
/// acquired texture plus whether it was suboptimal, or an [`EmberError`].
pub(crate) fn classify_surface_texture(
    frame: wgpu::CurrentSurfaceTexture,
) -> Result<(wgpu::SurfaceTexture, bool)> {
    match frame {
        wgpu::CurrentSurfaceTexture::Success(tex) => Ok((tex, false)),
        wgpu::CurrentSurfaceTexture::Suboptimal(tex) => Ok((tex, true)),
        wgpu::CurrentSurfaceTexture::Timeout => Err(EmberError::SurfaceTimeout),
        wgpu::CurrentSurfaceTexture::Occluded => Err(EmberError::SurfaceTimeout),
        wgpu::CurrentSurfaceTexture::Outdated => Err(EmberError::SwapchainOutOfDate),
        wgpu::CurrentSurfaceTexture::Lost => Err(EmberError::DeviceLost("surface lost".into())),
        wgpu::CurrentSurfaceTexture::Validation => {
            Err(EmberError::DeviceLost("surface validation error".into()))
        }
    }
}

/// Alias for `Result<T, EmberError>`.
pub type Result<T> = std::result::Result<T, EmberError>;
