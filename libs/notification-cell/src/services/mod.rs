pub mod dispatcher;
pub mod expo;
pub mod recording;
pub mod tokens;

pub use dispatcher::{DeliveryMode, NotificationDispatcher};
pub use expo::{ExpoPushClient, PushNotifier};
pub use recording::RecordingNotifier;
pub use tokens::{InMemoryPushTokenDirectory, PushTokenDirectory, SupabasePushTokenDirectory};
