mod discord;

pub use discord::DiscordGateway;
