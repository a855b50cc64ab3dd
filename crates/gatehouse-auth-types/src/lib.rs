//! Auth types shared across Gatehouse services.
//!
//! Session authentication happens at the gateway; services only see the
//! identity it forwards. See [`identity::IdentityHeaders`].

pub mod identity;
