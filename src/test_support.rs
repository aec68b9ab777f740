use axum::Router;
use tokio::net::TcpListener;
use url::Url;

/// Serves `router` on an ephemeral local port and returns its root URL.
pub async fn spawn_upstream(router: Router) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .await
            .unwrap();
    });

    Url::parse(&format!("http://{addr}/")).unwrap()
}
