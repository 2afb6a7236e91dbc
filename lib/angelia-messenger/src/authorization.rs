use std::future::Future;

use crate::UserId;

// TODO: deduplicate with data_access
macro_rules! async_result {
    ($t:ty) => {
        impl Future<Output = Result<$t, Self::Error>> + Send
    };
}

pub trait Authenticator: 'static + Send + Sync + Clone {
    type Error: 'static + std::error::Error + Send + Sync;

    fn verify(&self, user_id: &UserId, password: String) -> async_result!(bool);
    fn register(&self, user_id: &UserId, password: String) -> async_result!(());
}
