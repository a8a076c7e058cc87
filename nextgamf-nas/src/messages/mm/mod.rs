//! 5GMM (5G Mobility Management) Messages (TS 24.501 §8.2)
//!
//! ## Registration
//!
//! - [`RegistrationRequest`], [`RegistrationAccept`], [`RegistrationComplete`], [`RegistrationReject`]
//!
//! ## Deregistration (UE originating)
//!
//! - [`DeregistrationRequestUeOriginating`], [`DeregistrationAcceptUeOriginating`]
//!
//! ## Service
//!
//! - [`ServiceRequest`], [`ServiceAccept`], [`ServiceReject`]
//!
//! ## Common procedures
//!
//! - Authentication: [`AuthenticationRequest`], [`AuthenticationResponse`],
//!   [`AuthenticationReject`], [`AuthenticationFailure`]
//! - Identification: [`IdentityRequest`], [`IdentityResponse`]
//! - Security mode control: [`SecurityModeCommand`], [`SecurityModeComplete`], [`SecurityModeReject`]
//! - Generic UE configuration update: [`ConfigurationUpdateCommand`]
//!
//! ## Transport and status
//!
//! - [`UlNasTransport`], [`DlNasTransport`], [`MmStatus`]

mod authentication;
mod configuration;
mod deregistration;
mod identity;
mod nas_transport;
mod registration;
mod security_mode;
mod service;
mod status;

pub use authentication::*;
pub use configuration::*;
pub use deregistration::*;
pub use identity::*;
pub use nas_transport::*;
pub use registration::*;
pub use security_mode::*;
pub use service::*;
pub use status::*;
