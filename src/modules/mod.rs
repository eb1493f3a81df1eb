pub mod conversation;
pub mod delivery;
pub mod membership;
pub mod message;
pub mod notification;
pub mod presence;
pub mod websocket;
