//! Integration tests for the gustobot library.
//! Each test talks to a throwaway HTTP server on localhost that answers with
//! canned responses, so the real reqwest client and SSE decoder are exercised.

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use gustobot::{
        Attachment, ChatApi, ChatSession, ExchangeState, GustoBot, KnowledgeSearch, KnownRoute,
        MemoryStore, Route, SEND_FAILURE_TEXT, SESSION_ID_KEY, SendOutcome, SessionStore,
        StreamCancel,
    };

    /// Requests the server saw, as raw text (head and body).
    type Seen = Arc<Mutex<Vec<String>>>;

    /// Serve each canned response to one connection, in order.
    async fn serve(responses: Vec<String>) -> (String, Seen) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let record = Arc::clone(&seen);
        tokio::spawn(async move {
            for response in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let request = read_request(&mut socket).await;
                record.lock().unwrap().push(request);
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        (format!("http://{}", addr), seen)
    }

    /// Accept connections, read each request and never answer.
    async fn stall() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((mut socket, _)) = listener.accept().await {
                read_request(&mut socket).await;
                held.push(socket);
            }
        });
        format!("http://{}", addr)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            if let Some(end) = find(&buf, b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let body = &buf[end + 4..];
                let done = if let Some(len) = content_length(&head) {
                    body.len() >= len
                } else if head.contains("transfer-encoding: chunked") {
                    find(body, b"0\r\n\r\n").is_some()
                } else {
                    true
                };
                if done {
                    break;
                }
            }
            match socket.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    fn content_length(head: &str) -> Option<usize> {
        head.lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse().ok())
    }

    fn json_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        )
    }

    fn sse_response(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        )
    }

    fn client(base: &str) -> GustoBot {
        GustoBot::with_options(Some(base.to_string()), None, None).unwrap()
    }

    fn session(base: &str) -> (ChatSession<GustoBot, Arc<MemoryStore>>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (ChatSession::new(client(base), Arc::clone(&store)), store)
    }

    #[tokio::test]
    async fn blocking_send_adopts_session() {
        let (base, seen) = serve(vec![json_response(
            "200 OK",
            r#"{"answer":"先焯水，再慢炖。","session_id":"s-1","metadata":{"route":"kb-query"},"sources":[{"title":"红烧肉"}]}"#,
        )])
        .await;
        let (mut session, store) = session(&base);

        let outcome = session.send_message("怎么做红烧肉？").await;

        assert_eq!(outcome, SendOutcome::Answered);
        assert_eq!(session.state(), ExchangeState::SettledSuccess);
        assert_eq!(session.session_id(), Some("s-1"));
        assert_eq!(store.get(SESSION_ID_KEY).as_deref(), Some("s-1"));

        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].is_user());
        assert_eq!(messages[1].content, "先焯水，再慢炖。");
        assert_eq!(messages[1].route, Some(Route::Known(KnownRoute::KbQuery)));
        assert!(!messages[1].error);

        let requests = seen.lock().unwrap();
        assert!(requests[0].starts_with("POST /api/v1/chat/chat HTTP/1.1"));
        assert!(requests[0].contains(r#""message":"怎么做红烧肉？""#));
        assert!(requests[0].contains(r#""user_id":"web_user""#));
        assert!(!requests[0].contains("session_id"));
    }

    #[tokio::test]
    async fn second_send_carries_session_id() {
        let (base, seen) = serve(vec![
            json_response("200 OK", r#"{"answer":"好的","session_id":"s-2"}"#),
            json_response("200 OK", r#"{"message":"还有呢"}"#),
        ])
        .await;
        let (mut session, _store) = session(&base);

        assert_eq!(session.send_message("推荐一道菜").await, SendOutcome::Answered);
        assert_eq!(session.send_message("再来一道").await, SendOutcome::Answered);

        assert_eq!(session.messages()[3].content, "还有呢");
        let requests = seen.lock().unwrap();
        assert!(requests[1].contains(r#""session_id":"s-2""#));
    }

    #[tokio::test]
    async fn server_error_detail_becomes_reply() {
        let (base, _seen) = serve(vec![
            json_response("500 Internal Server Error", r#"{"detail":"模型服务不可用"}"#),
            json_response("503 Service Unavailable", r#"{"detail":"维护中"}"#),
        ])
        .await;
        let (mut session, _store) = session(&base);

        let outcome = session.send_message("你好").await;
        assert_eq!(outcome, SendOutcome::Failed);
        assert_eq!(session.state(), ExchangeState::SettledError);
        let reply = &session.messages()[1];
        assert!(reply.error);
        assert_eq!(reply.content, "模型服务不可用");
        assert!(session.can_send());

        let err = session
            .api()
            .routes()
            .await
            .expect_err("503 should be an error");
        assert_eq!(err.status_code(), Some(503));
        assert_eq!(err.detail(), Some("维护中"));
        assert!(err.is_server_error());
    }

    #[tokio::test]
    async fn request_id_is_kept_on_errors() {
        let body = r#"{"detail":"Session not found"}"#;
        let response = format!(
            "HTTP/1.1 404 Not Found\r\nContent-Type: application/json\r\nx-request-id: req-42\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let (base, _seen) = serve(vec![response]).await;

        let err = client(&base).history("gone").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.request_id(), Some("req-42"));
        assert_eq!(err.detail(), Some("Session not found"));
    }

    #[tokio::test]
    async fn unreachable_service_gets_fallback_text() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let (mut session, _store) = session(&format!("http://{}", addr));

        let outcome = session.send_message("在吗？").await;

        assert_eq!(outcome, SendOutcome::Failed);
        let reply = &session.messages()[1];
        assert!(reply.error);
        assert_eq!(reply.content, SEND_FAILURE_TEXT);
        assert!(session.session_id().is_none());
    }

    #[tokio::test]
    async fn stream_skips_malformed_lines() {
        let body = concat!(
            "data: {\"type\":\"metadata\",\"session_id\":\"s-3\",\"route\":\"kb-query\"}\n\n",
            "data: {\"token\":\"a\"}\n\n",
            "data: {\"token\":\"b\"}\n\n",
            "data: {not json}\n\n",
            "data: {\"token\":\"c\"}\n\n",
            "data: [DONE]\n\n",
            "data: {\"token\":\"never\"}\n\n",
        );
        let (base, seen) = serve(vec![sse_response(body)]).await;
        let (mut session, store) = session(&base);

        let cancel = StreamCancel::new();
        let mut chunks = Vec::new();
        let outcome = session
            .send_stream_message("推荐 家常菜", &cancel, |event| {
                if let Some(text) = event.text() {
                    chunks.push(text.to_string());
                }
            })
            .await;

        assert_eq!(outcome, SendOutcome::Answered);
        assert_eq!(chunks, vec!["a", "b", "c"]);
        let reply = &session.messages()[1];
        assert_eq!(reply.content, "abc");
        assert_eq!(reply.route, Some(Route::Known(KnownRoute::KbQuery)));
        assert_eq!(store.get(SESSION_ID_KEY).as_deref(), Some("s-3"));

        let requests = seen.lock().unwrap();
        let request = &requests[0];
        assert!(request.starts_with("GET /api/v1/chat/chat/stream?message="));
        assert!(request.contains("user_id=web_user"));
        assert!(request.contains("session_id=&"));
        assert!(request.to_lowercase().contains("accept: text/event-stream"));
    }

    #[tokio::test]
    async fn stream_open_failure_settles_with_error() {
        let (base, _seen) = serve(vec![json_response(
            "502 Bad Gateway",
            r#"{"detail":"上游超时"}"#,
        )])
        .await;
        let (mut session, _store) = session(&base);

        let outcome = session
            .send_stream_message("你好", &StreamCancel::new(), |_| {})
            .await;

        assert_eq!(outcome, SendOutcome::Failed);
        let reply = &session.messages()[1];
        assert!(reply.error);
        assert_eq!(reply.content, "上游超时");
    }

    #[tokio::test]
    async fn delete_session_accepts_no_content() {
        let (base, seen) = serve(vec![
            "HTTP/1.1 204 No Content\r\nConnection: close\r\n\r\n".to_string(),
        ])
        .await;
        let store = Arc::new(MemoryStore::new());
        store.set(SESSION_ID_KEY, "s-7").unwrap();
        let mut session = ChatSession::new(client(&base), Arc::clone(&store));
        assert_eq!(session.session_id(), Some("s-7"));

        session.clear_history().await.unwrap();

        assert!(session.session_id().is_none());
        assert!(session.messages().is_empty());
        assert!(store.get(SESSION_ID_KEY).is_none());
        let requests = seen.lock().unwrap();
        assert!(requests[0].starts_with("DELETE /api/v1/chat/session/s-7 HTTP/1.1"));
    }

    #[tokio::test]
    async fn knowledge_stats_from_knowledge_url() {
        let (base, seen) = serve(vec![json_response(
            "200 OK",
            r#"{"total_documents":12,"total_recipes":340,"embedding_model":"bge-m3","collection_name":"recipes"}"#,
        )])
        .await;

        let stats = client(&base).knowledge_stats().await.unwrap();

        assert_eq!(stats.total_documents, 12);
        assert_eq!(stats.total_recipes, 340);
        assert_eq!(stats.embedding_model_or_default(), "bge-m3");
        assert_eq!(stats.embedding_dimension_or_default(), 1536);
        let requests = seen.lock().unwrap();
        assert!(requests[0].starts_with("GET /api/v1/knowledge/stats HTTP/1.1"));
    }

    #[tokio::test]
    async fn upload_rides_along_with_next_stream() {
        let (base, seen) = serve(vec![
            json_response(
                "200 OK",
                r#"{"success":true,"message":"上传成功","file_path":"/uploads/menu.pdf"}"#,
            ),
            sse_response("data: {\"content\":\"已读取菜单\"}\n\n"),
        ])
        .await;
        let (mut session, _store) = session(&base);

        let response = session
            .upload_file(Attachment::new("menu.pdf", b"%PDF-1.4".to_vec()))
            .await
            .unwrap();
        assert_eq!(response.message.as_deref(), Some("上传成功"));
        assert_eq!(session.pending_file_path(), Some("/uploads/menu.pdf"));

        let outcome = session
            .send_stream_message("总结一下", &StreamCancel::new(), |_| {})
            .await;
        assert_eq!(outcome, SendOutcome::Answered);
        assert!(session.pending_file_path().is_none());

        let requests = seen.lock().unwrap();
        assert!(requests[0].starts_with("POST /api/v1/upload/upload/file HTTP/1.1"));
        assert!(requests[0].contains("name=\"file\"; filename=\"menu.pdf\""));
        assert!(requests[1].contains("file_path=%2Fuploads%2Fmenu.pdf"));
    }

    #[tokio::test]
    async fn silent_service_times_out() {
        let base = stall().await;
        let client = GustoBot::with_options(
            Some(base.clone()),
            None,
            Some(Duration::from_millis(100)),
        )
        .unwrap();

        let start = Instant::now();
        let err = client.routes().await.unwrap_err();
        assert!(err.is_timeout(), "{err:?}");
        assert!(err.is_retryable());
        assert!(start.elapsed() < Duration::from_secs(5));

        let store = Arc::new(MemoryStore::new());
        let mut session = ChatSession::new(client, Arc::clone(&store));
        let outcome = session.send_message("在吗？").await;
        assert_eq!(outcome, SendOutcome::Failed);
        assert_eq!(session.state(), ExchangeState::SettledError);
        let reply = &session.messages()[1];
        assert!(reply.error);
        assert_eq!(reply.content, SEND_FAILURE_TEXT);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn uploads_use_their_own_timeout() {
        let base = stall().await;
        let client = GustoBot::with_options(Some(base), None, None)
            .unwrap()
            .with_upload_timeout(Duration::from_millis(100));
        assert_eq!(client.timeout(), Duration::from_secs(30));

        let start = Instant::now();
        let err = client
            .upload_file(Attachment::new("menu.pdf", b"%PDF-1.4".to_vec()))
            .await
            .unwrap_err();
        assert!(err.is_timeout(), "{err:?}");
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn stream_outlives_the_request_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            read_request(&mut socket).await;
            let head = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n";
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(b"data: {\"type\":\"message\",\"content\":\"\xE6\x85\xA2 \"}\n\n").await;
            tokio::time::sleep(Duration::from_millis(300)).await;
            let _ = socket.write_all(b"data: {\"type\":\"message\",\"content\":\"\xE7\x82\x96 \"}\n\n").await;
            let _ = socket.shutdown().await;
        });
        let client = GustoBot::with_options(
            Some(format!("http://{}", addr)),
            None,
            Some(Duration::from_millis(100)),
        )
        .unwrap();
        let store = Arc::new(MemoryStore::new());
        let mut session = ChatSession::new(client, store);

        let outcome = session
            .send_stream_message("怎么炖？", &StreamCancel::new(), |_| {})
            .await;

        assert_eq!(outcome, SendOutcome::Answered);
        assert_eq!(session.messages()[1].content, "慢 炖 ");
    }

    #[tokio::test]
    async fn search_posts_to_knowledge_url() {
        let (base, seen) = serve(vec![json_response(
            "200 OK",
            r#"{"results":[{"id":"recipe_1","name":"红烧肉","score":0.92}],"count":1}"#,
        )])
        .await;

        let results = client(&base)
            .search_knowledge(&KnowledgeSearch::new("红烧肉").with_top_k(3))
            .await
            .unwrap();

        assert_eq!(results.count, 1);
        assert_eq!(results.labels(), vec!["红烧肉"]);
        let requests = seen.lock().unwrap();
        assert!(requests[0].starts_with("POST /api/v1/knowledge/search HTTP/1.1"));
        assert!(requests[0].contains(r#""query":"红烧肉""#));
        assert!(requests[0].contains(r#""top_k":3"#));
    }

    #[tokio::test]
    async fn add_recipe_and_status() {
        let (base, seen) = serve(vec![
            json_response(
                "201 Created",
                r#"{"status":"success","message":"Recipe added","recipe_id":"recipe_ab12cd34"}"#,
            ),
            json_response("200 OK", r#"{"status":"healthy"}"#),
        ])
        .await;
        let client = client(&base);

        let added = client
            .add_recipe(&json!({"name": "番茄炒蛋", "steps": ["打蛋", "翻炒"]}))
            .await
            .unwrap();
        assert_eq!(added["recipe_id"], "recipe_ab12cd34");

        let err = client.add_recipe(&json!({"steps": []})).await.unwrap_err();
        assert!(err.is_validation());

        let status = client.system_status().await.unwrap();
        assert_eq!(status["status"], "healthy");

        let requests = seen.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].starts_with("POST /api/v1/knowledge/recipes HTTP/1.1"));
        assert!(requests[0].contains(r#""name":"番茄炒蛋""#));
        assert!(requests[1].starts_with("GET /api/v1/chat/status HTTP/1.1"));
    }
}
