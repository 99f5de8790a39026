use std::{
    any::Any,
    future::{ready, Future},
    pin::Pin,
    sync::Arc,
};

use tether_shared::{catch_panic, panic_message, Args, BoxError, Payload, RemoteError, SessionId};

pub(crate) type MethodFuture = Pin<Box<dyn Future<Output = Result<Args, RemoteError>> + Send>>;

/// A method handler with its service, request and response types erased
pub(crate) type MethodHandler =
    Arc<dyn Fn(Arc<dyn Any + Send + Sync>, SessionId, Args) -> MethodFuture + Send + Sync>;

pub(crate) fn erase_method<S, Q, R, E, F, Fut>(handler: F) -> MethodHandler
where
    S: Send + Sync + 'static,
    Q: Payload,
    R: Payload,
    E: Into<BoxError>,
    F: Fn(Arc<S>, SessionId, Q) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
{
    Arc::new(move |service, session, args| {
        let Ok(service) = service.downcast::<S>() else {
            return Box::pin(ready(Err(RemoteError::Failed(
                "service instance has an unexpected type".to_string(),
            ))));
        };
        let request = match args.decode::<Q>() {
            Ok(request) => request,
            Err(err) => return Box::pin(ready(Err(RemoteError::BadPayload(err.to_string())))),
        };

        let call = handler(service, session, request);
        Box::pin(async move {
            match call.await {
                Ok(response) => {
                    Args::encode(&response).map_err(|err| RemoteError::Failed(err.to_string()))
                }
                Err(err) => {
                    let err: BoxError = err.into();
                    Err(RemoteError::Failed(err.to_string()))
                }
            }
        })
    })
}

/// Runs one invocation on its own task so that a panic anywhere in the
/// handler ends up as a [`RemoteError::Failed`]
pub(crate) async fn invoke(
    handler: MethodHandler,
    service: Arc<dyn Any + Send + Sync>,
    session: SessionId,
    args: Args,
) -> Result<Args, RemoteError> {
    let call = catch_panic(move || handler(service, session, args))
        .map_err(|message| RemoteError::Failed(format!("handler panicked: {message}")))?;

    match tokio::spawn(call).await {
        Ok(result) => result,
        Err(err) if err.is_panic() => Err(RemoteError::Failed(format!(
            "handler panicked: {}",
            panic_message(&*err.into_panic())
        ))),
        Err(_) => Err(RemoteError::Failed("handler was cancelled".to_string())),
    }
}
