mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};

use common::{TestApp, media_refs};

fn titles(body: &serde_json::Value) -> Vec<String> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|c| c["title"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn create_with_attachments_then_delete_removes_files() {
    let app = TestApp::new().await;
    let token = app.register("ann@example.com").await;

    let (status, body) = app
        .create_capsule(
            &token,
            &[
                ("title", "Beach day"),
                ("text", "Sand everywhere"),
                ("date", "2024-07-14"),
                ("tags", "summer, family"),
                ("time_capsule", "2030-01-01 09:00"),
            ],
            &[
                ("waves.jpg", "image/jpeg", b"jpeg-bytes"),
                ("gulls.mp3", "audio/mpeg", b"mp3-bytes"),
                ("surf.mp4", "video/mp4", b"mp4-bytes"),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["msg"], "Capsule uploaded");
    let id = body["id"].as_i64().unwrap();

    let (status, list) = app.list(&token, "").await;
    assert_eq!(status, StatusCode::OK);
    let capsule = &list[0];
    assert_eq!(capsule["id"], id);
    assert_eq!(capsule["text"], "Sand everywhere");
    assert_eq!(capsule["tags"], "summer,family");
    assert_eq!(capsule["time_capsule"], "2030-01-01 09:00");

    let refs = media_refs(capsule);
    assert_eq!(refs.len(), 3);
    assert!(refs[0].ends_with("_waves.jpg"));
    assert!(refs[2].ends_with("_surf.mp4"));

    // Served back at the reference path.
    let (status, bytes) = app.get_raw(&refs[0]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"jpeg-bytes");

    let paths: Vec<_> = refs.iter().map(|r| app.static_path(r)).collect();
    assert!(paths.iter().all(|p| p.exists()));

    let (status, body) = app.delete(&token, id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["msg"], "Capsule deleted successfully");
    assert!(paths.iter().all(|p| !p.exists()));

    let (_, list) = app.list(&token, "").await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn repeated_delete_is_not_found() {
    let app = TestApp::new().await;
    let token = app.register("ann@example.com").await;
    let id = app.quick_capsule(&token, "once", "2024-01-01", "").await;

    let (status, _) = app.delete(&token, id).await;
    assert_eq!(status, StatusCode::OK);

    for _ in 0..2 {
        let (status, body) = app.delete(&token, id).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Capsule not found");
    }

    let (status, _) = app.delete(&token, 12_345).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn capsules_are_invisible_to_other_users() {
    let app = TestApp::new().await;
    let ann = app.register("ann@example.com").await;
    let bob = app.register("bob@example.com").await;

    let (_, body) = app
        .create_capsule(
            &ann,
            &[("title", "private"), ("text", "mine"), ("date", "2024-02-02")],
            &[("diary.png", "image/png", b"png")],
        )
        .await;
    let id = body["id"].as_i64().unwrap();

    let (status, list) = app.list(&bob, "").await;
    assert_eq!(status, StatusCode::OK);
    assert!(list.as_array().unwrap().is_empty());

    let (status, _) = app.delete(&bob, id).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Still intact for the owner, media included.
    let (_, list) = app.list(&ann, "").await;
    let refs = media_refs(&list[0]);
    assert!(app.static_path(&refs[0]).exists());
}

#[tokio::test]
async fn after_filter_returns_newest_first() {
    let app = TestApp::new().await;
    let token = app.register("ann@example.com").await;
    for (title, date) in [("jan", "2024-01-01"), ("jun", "2024-06-01"), ("dec", "2024-12-01")] {
        app.quick_capsule(&token, title, date, "").await;
    }

    let (status, body) = app.list(&token, "?after=2024-05-01").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(titles(&body), ["dec", "jun"]);

    let (_, body) = app.list(&token, "?before=2024-06-01").await;
    assert_eq!(titles(&body), ["jun", "jan"]);

    let (_, body) = app.list(&token, "?after=&before=").await;
    assert_eq!(titles(&body), ["dec", "jun", "jan"]);
}

#[tokio::test]
async fn tag_filter_uses_substring_semantics() {
    let app = TestApp::new().await;
    let token = app.register("ann@example.com").await;
    app.quick_capsule(&token, "party", "2024-03-03", "birthday,family").await;
    app.quick_capsule(&token, "hike", "2024-04-04", "outdoors").await;

    let (_, body) = app.list(&token, "?tag=family").await;
    assert_eq!(titles(&body), ["party"]);

    // A partial tag matches too.
    let (_, body) = app.list(&token, "?tag=birth").await;
    assert_eq!(titles(&body), ["party"]);

    let (_, body) = app.list(&token, "?tag=birthday&after=2024-04-01").await;
    assert!(titles(&body).is_empty());
}

#[tokio::test]
async fn capsule_type_filters_by_attachment_kind() {
    let app = TestApp::new().await;
    let token = app.register("ann@example.com").await;
    app.create_capsule(
        &token,
        &[("title", "song"), ("text", "t"), ("date", "2024-01-01")],
        &[("tune.mp3", "audio/mpeg", b"mp3")],
    )
    .await;
    app.create_capsule(
        &token,
        &[("title", "photo"), ("text", "t"), ("date", "2024-01-02")],
        &[("pic.bin", "image/png", b"png")],
    )
    .await;

    let (_, body) = app.list(&token, "?capsule_type=audio").await;
    assert_eq!(titles(&body), ["song"]);

    let (_, body) = app.list(&token, "?capsule_type=image").await;
    assert_eq!(titles(&body), ["photo"]);

    let (status, _) = app.list(&token, "?capsule_type=hologram").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_date_is_rejected_without_leaving_files() {
    let app = TestApp::new().await;
    let token = app.register("ann@example.com").await;

    let (status, body) = app
        .create_capsule(
            &token,
            &[("title", "t"), ("text", "x"), ("date", "last tuesday")],
            &[("a.png", "image/png", b"png")],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "invalid date format");

    let uploads = app.state.static_dir.join("uploads");
    assert_eq!(std::fs::read_dir(uploads).unwrap().count(), 0);
}

#[tokio::test]
async fn missing_required_field_is_rejected() {
    let app = TestApp::new().await;
    let token = app.register("ann@example.com").await;

    let (status, body) = app
        .create_capsule(&token, &[("title", "t"), ("date", "2024-01-01")], &[])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "field 'text' is required");
}

#[tokio::test]
async fn empty_file_part_is_ignored() {
    let app = TestApp::new().await;
    let token = app.register("ann@example.com").await;

    let (status, _) = app
        .create_capsule(
            &token,
            &[("title", "t"), ("text", "x"), ("date", "2024-01-01"), ("time_capsule", "")],
            &[("", "application/octet-stream", b"")],
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, list) = app.list(&token, "").await;
    assert!(media_refs(&list[0]).is_empty());
    assert!(list[0]["time_capsule"].is_null());
}

#[tokio::test]
async fn non_multipart_create_and_bad_id_are_validation_errors() {
    let app = TestApp::new().await;
    let token = app.register("ann@example.com").await;

    let req = Request::builder()
        .method("POST")
        .uri("/capsules")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"title":"t","text":"x","date":"2024-01-01"}"#))
        .unwrap();
    let (status, body) = app.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());

    let req = Request::builder()
        .method("DELETE")
        .uri("/capsules/latest")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());

    let (_, list) = app.list(&token, "").await;
    assert!(list.as_array().unwrap().is_empty());
}
