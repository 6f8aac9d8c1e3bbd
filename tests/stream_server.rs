mod common;

use std::{
    io::{Read, Write},
    net::{SocketAddr, TcpStream},
    sync::{atomic::Ordering, Arc},
    thread,
    time::Duration,
};

use signcam::{
    bootstrap::AppState,
    server,
    video::{httpcam::HttpCamera, Camera},
};

use common::{open_hand, stump_predictor, CountingCamera, FiniteCamera};

/// Starts a server streaming `frames` frames and returns its address.
async fn start(frames: usize) -> SocketAddr {
    serve_camera(Box::new(FiniteCamera::new(frames))).await
}

async fn serve_camera(camera: Box<dyn Camera>) -> SocketAddr {
    let dir = tempfile::tempdir().unwrap();
    let predictor = stump_predictor(dir.path(), vec![open_hand(0.3, 0.3, 0.4)]);
    let state = Arc::new(AppState::new(camera, predictor, 90));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server::serve(listener, state));
    addr
}

/// Sends a bare GET request and returns everything read until `until` shows up (or EOF).
fn request(addr: SocketAddr, path: &str, until: &[u8]) -> Vec<u8> {
    let mut conn = TcpStream::connect(addr).unwrap();
    write!(
        conn,
        "GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n"
    )
    .unwrap();

    let mut response = Vec::new();
    let mut buf = [0; 4096];
    while !response.windows(until.len()).any(|w| w == until) {
        let n = conn.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        response.extend_from_slice(&buf[..n]);
    }
    response
}

#[tokio::test(flavor = "multi_thread")]
async fn stream_has_multipart_headers() {
    let addr = start(2).await;
    let response = tokio::task::spawn_blocking(move || {
        request(addr, "/asl_stream", b"--frame\r\nContent-Type: image/jpeg\r\n\r\n")
    })
    .await
    .unwrap();

    let response = String::from_utf8_lossy(&response).to_lowercase();
    assert!(response.starts_with("http/1.1 200"), "{response}");
    assert!(
        response.contains("content-type: multipart/x-mixed-replace; boundary=frame\r\n"),
        "{response}"
    );
    assert!(response.contains("--frame\r\ncontent-type: image/jpeg\r\n\r\n"));
}

#[tokio::test(flavor = "multi_thread")]
async fn stream_is_readable_as_a_camera() {
    let addr = start(3).await;
    tokio::task::spawn_blocking(move || {
        let mut camera = HttpCamera::connect(&format!("http://{addr}/asl_stream")).unwrap();
        for _ in 0..3 {
            let frame = camera.read().unwrap();
            assert_eq!((frame.width(), frame.height()), (160, 120));
            // top edge of the black bounding box
            let px = frame.get(56, 26);
            assert!(px.r() < 60 && px.g() < 60 && px.b() < 60, "{px:?}");
        }
        // the camera is exhausted, which ends the stream
        assert!(camera.read().is_err());
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn disconnect_stops_capturing() {
    let camera = CountingCamera::new();
    let reads = camera.reads.clone();
    let addr = serve_camera(Box::new(camera)).await;

    tokio::task::spawn_blocking(move || {
        // dropped right after the first part, leaving later parts unread
        let response = request(addr, "/asl_stream", b"--frame\r\nContent-Type: image/jpeg\r\n");
        assert!(!response.is_empty());
        assert!(reads.load(Ordering::SeqCst) > 0);

        thread::sleep(Duration::from_secs(1));
        let after_disconnect = reads.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(500));
        assert_eq!(reads.load(Ordering::SeqCst), after_disconnect);
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn other_paths_are_not_found() {
    let addr = start(1).await;
    let response = tokio::task::spawn_blocking(move || request(addr, "/", b"\r\n\r\n"))
        .await
        .unwrap();
    let response = String::from_utf8_lossy(&response);
    assert!(response.starts_with("HTTP/1.1 404"), "{response}");
}
