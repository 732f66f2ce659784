/// Counting game enforcement, reconciliation and filler.
pub mod counting;
/// Event routing to the owning subsystem.
pub mod dispatcher;
/// Health snapshot service.
pub mod health_service;
/// Moderator timeout workflow.
pub mod moderation;
/// Startup synchronisation with the platform.
pub mod startup;
/// Verification gate.
pub mod verification;
