#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mockito::{Matcher, Server, ServerGuard};
    use url::Url;

    use crate::auth::Credentials;
    use crate::config::Settings;
    use crate::error::Error;
    use crate::providers::jenkins::JenkinsClient;
    use crate::service::{BuildParameters, JobService};
    use crate::trigger::{BuildStatus, BuildTriggerClient, DeleteOutcome};

    // base64("admin:secret")
    const BASIC_AUTH: &str = "Basic YWRtaW46c2VjcmV0";

    const JOB_JSON: &str = r#"{
        "_class": "hudson.model.FreeStyleProject",
        "name": "app",
        "url": "http://jenkins/job/app/",
        "buildable": true,
        "inQueue": false,
        "nextBuildNumber": 43,
        "lastBuild": {"number": 42}
    }"#;

    fn settings_for(server: &ServerGuard) -> Settings {
        let _ = env_logger::builder().is_test(true).try_init();

        Settings {
            server_url: Url::parse(&format!("{}/", server.url())).unwrap(),
            credentials: Credentials::new("admin", "secret"),
            timeout: Duration::from_secs(5),
            not_found_delay: Duration::from_millis(10),
            user_agent: "jenkins-build-trigger-tests".to_string(),
        }
    }

    fn client_for(server: &ServerGuard) -> JenkinsClient {
        JenkinsClient::new(&settings_for(server)).unwrap()
    }

    async fn no_crumb(server: &mut ServerGuard) -> mockito::Mock {
        server
            .mock("GET", "/crumbIssuer/api/json")
            .with_status(404)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_get_job_info_sends_basic_auth() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/job/app/api/json")
            .match_query(Matcher::Any)
            .match_header("authorization", BASIC_AUTH)
            .match_header("user-agent", "jenkins-build-trigger-tests")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(JOB_JSON)
            .create_async()
            .await;

        let job = client_for(&server).get_job_info("app").await.unwrap();

        assert_eq!(job.name, "app");
        assert_eq!(job.next_build_number, 43);
        assert_eq!(job.last_build_number, Some(42));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_folder_jobs_use_nested_paths() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/job/team/job/app/api/json")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(JOB_JSON)
            .create_async()
            .await;

        client_for(&server).get_job_info("team/app").await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_build_is_not_found() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/job/app/44/api/json")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let err = client_for(&server).get_build_info("app", 44).await.unwrap_err();

        assert!(err.is_not_found());
        assert!(err.to_string().contains("#44"));
    }

    #[tokio::test]
    async fn test_server_error_maps_to_api_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/job/app/api/json")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("<!DOCTYPE html><html><body>Oops</body></html>")
            .create_async()
            .await;

        let err = client_for(&server).get_job_info("app").await.unwrap_err();

        match err {
            Error::Api { status, message } => {
                assert_eq!(status, 500);
                assert!(!message.contains("Oops"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_build_with_parameters_sends_crumb_and_form() {
        let mut server = Server::new_async().await;
        let crumb = server
            .mock("GET", "/crumbIssuer/api/json")
            .with_status(200)
            .with_body(r#"{"crumb": "abc123", "crumbRequestField": "Jenkins-Crumb"}"#)
            .create_async()
            .await;
        let queue_url = format!("{}/queue/item/17/", server.url());
        let build = server
            .mock("POST", "/job/app/buildWithParameters")
            .match_header("jenkins-crumb", "abc123")
            .match_header("authorization", BASIC_AUTH)
            .match_body(Matcher::UrlEncoded("BRANCH".into(), "main".into()))
            .with_status(201)
            .with_header("location", &queue_url)
            .create_async()
            .await;

        let mut parameters = BuildParameters::new();
        parameters.insert("BRANCH".to_string(), "main".to_string());

        let queue_item = client_for(&server).build_job("app", &parameters).await.unwrap();

        assert_eq!(queue_item.unwrap().as_str(), queue_url);
        crumb.assert_async().await;
        build.assert_async().await;
    }

    #[tokio::test]
    async fn test_build_without_parameters_and_without_crumb_issuer() {
        let mut server = Server::new_async().await;
        let _crumb = no_crumb(&mut server).await;
        let build = server
            .mock("POST", "/job/app/build")
            .with_status(201)
            .create_async()
            .await;

        let queue_item = client_for(&server)
            .build_job("app", &BuildParameters::new())
            .await
            .unwrap();

        assert!(queue_item.is_none());
        build.assert_async().await;
    }

    #[tokio::test]
    async fn test_crumb_is_fetched_once() {
        let mut server = Server::new_async().await;
        let crumb = server
            .mock("GET", "/crumbIssuer/api/json")
            .with_status(200)
            .with_body(r#"{"crumb": "abc123", "crumbRequestField": "Jenkins-Crumb"}"#)
            .expect(1)
            .create_async()
            .await;
        let build = server
            .mock("POST", "/job/app/build")
            .with_status(201)
            .expect(2)
            .create_async()
            .await;

        let client = client_for(&server);
        client.build_job("app", &BuildParameters::new()).await.unwrap();
        client.build_job("app", &BuildParameters::new()).await.unwrap();

        crumb.assert_async().await;
        build.assert_async().await;
    }

    #[tokio::test]
    async fn test_session_cookie_travels_with_crumb() {
        let mut server = Server::new_async().await;
        let _crumb = server
            .mock("GET", "/crumbIssuer/api/json")
            .with_status(200)
            .with_header("set-cookie", "JSESSIONID.abc=sess1; Path=/; HttpOnly")
            .with_body(r#"{"crumb": "abc123", "crumbRequestField": "Jenkins-Crumb"}"#)
            .create_async()
            .await;
        let _rejected = server
            .mock("POST", "/job/app/build")
            .match_header("cookie", Matcher::Missing)
            .with_status(403)
            .with_body("No valid crumb was included in the request")
            .create_async()
            .await;
        let accepted = server
            .mock("POST", "/job/app/build")
            .match_header("jenkins-crumb", "abc123")
            .match_header("cookie", Matcher::Regex("JSESSIONID.abc=sess1".into()))
            .with_status(201)
            .create_async()
            .await;

        client_for(&server)
            .build_job("app", &BuildParameters::new())
            .await
            .unwrap();

        accepted.assert_async().await;
    }

    #[tokio::test]
    async fn test_redirected_api_request_is_an_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/job/app/api/json")
            .match_query(Matcher::Any)
            .with_status(302)
            .with_header("location", "/login")
            .create_async()
            .await;

        let err = client_for(&server).get_job_info("app").await.unwrap_err();

        assert!(matches!(err, Error::Api { status: 302, .. }));
    }

    #[tokio::test]
    async fn test_create_job_transport_failure_is_network_error() {
        let mut settings = settings_for(&Server::new_async().await);
        // Nothing listens on the discard port
        settings.server_url = Url::parse("http://127.0.0.1:9/").unwrap();
        let client = BuildTriggerClient::from_settings(&settings).unwrap();

        let err = client.create_job("app", "<project/>").await.unwrap_err();

        assert!(matches!(err, Error::Network(_)), "unexpected error: {err:?}");
    }

    #[tokio::test]
    async fn test_create_job_rejected_by_server() {
        let mut server = Server::new_async().await;
        let _crumb = no_crumb(&mut server).await;
        let _mock = server
            .mock("GET", "/job/app/api/json")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;
        let _create = server
            .mock("POST", "/createItem")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body("malformed config")
            .create_async()
            .await;

        let client = BuildTriggerClient::from_settings(&settings_for(&server)).unwrap();
        let err = client.create_job("app", "not xml").await.unwrap_err();

        match err {
            Error::JobCreation { job, reason } => {
                assert_eq!(job, "app");
                assert!(reason.contains("malformed config"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_job_posts_config_and_confirms() {
        let mut server = Server::new_async().await;
        let _crumb = no_crumb(&mut server).await;
        let missing = server
            .mock("GET", "/job/app/api/json")
            .match_query(Matcher::Any)
            .with_status(404)
            .expect(1)
            .create_async()
            .await;
        let create = server
            .mock("POST", "/createItem")
            .match_query(Matcher::UrlEncoded("name".into(), "app".into()))
            .match_header("content-type", "text/xml; charset=utf-8")
            .match_body("<project/>")
            .with_status(200)
            .create_async()
            .await;
        let present = server
            .mock("GET", "/job/app/api/json")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(JOB_JSON)
            .expect(1)
            .create_async()
            .await;

        client_for(&server).create_job("app", "<project/>").await.unwrap();

        missing.assert_async().await;
        create.assert_async().await;
        present.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_job_in_folder() {
        let mut server = Server::new_async().await;
        let _crumb = no_crumb(&mut server).await;
        let _mock = server
            .mock("GET", "/job/team/job/app/api/json")
            .match_query(Matcher::Any)
            .with_status(404)
            .expect(1)
            .create_async()
            .await;
        let create = server
            .mock("POST", "/job/team/createItem")
            .match_query(Matcher::UrlEncoded("name".into(), "app".into()))
            .with_status(200)
            .create_async()
            .await;
        let _mock = server
            .mock("GET", "/job/team/job/app/api/json")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(JOB_JSON)
            .expect(1)
            .create_async()
            .await;

        client_for(&server)
            .create_job("team/app", "<project/>")
            .await
            .unwrap();

        create.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_duplicate_job_is_refused() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/job/app/api/json")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(JOB_JSON)
            .create_async()
            .await;
        let create = server
            .mock("POST", "/createItem")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let err = client_for(&server)
            .create_job("app", "<project/>")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::JobCreation { .. }));
        assert!(err.to_string().contains("already exists"));
        create.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_job_confirms_removal() {
        let mut server = Server::new_async().await;
        let _crumb = no_crumb(&mut server).await;
        let delete = server
            .mock("POST", "/job/app/doDelete")
            .with_status(302)
            .with_header("location", "/")
            .create_async()
            .await;
        let _mock = server
            .mock("GET", "/job/app/api/json")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        client_for(&server).delete_job("app").await.unwrap();

        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_job_still_present_is_error() {
        let mut server = Server::new_async().await;
        let _crumb = no_crumb(&mut server).await;
        let _mock = server
            .mock("POST", "/job/app/doDelete")
            .with_status(200)
            .create_async()
            .await;
        let _mock = server
            .mock("GET", "/job/app/api/json")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(JOB_JSON)
            .create_async()
            .await;

        let err = client_for(&server).delete_job("app").await.unwrap_err();

        assert!(matches!(err, Error::JobStillExists { ref job } if job == "app"));
        assert!(err.to_string().contains("still exists"));
    }

    #[tokio::test]
    async fn test_trigger_and_poll_against_server() {
        let mut server = Server::new_async().await;
        let _crumb = no_crumb(&mut server).await;
        let _mock = server
            .mock("GET", "/job/app/api/json")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(JOB_JSON)
            .create_async()
            .await;
        let _mock = server
            .mock("POST", "/job/app/build")
            .with_status(201)
            .create_async()
            .await;
        let _mock = server
            .mock("GET", "/job/app/42/api/json")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"number": 42, "building": false, "result": "ABORTED"}"#)
            .create_async()
            .await;
        let _mock = server
            .mock("GET", "/job/app/43/api/json")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let client = BuildTriggerClient::from_settings(&settings_for(&server)).unwrap();

        let triggered = client
            .trigger_build("app", &BuildParameters::new())
            .await
            .unwrap();
        assert_eq!(triggered.number, 43);

        let status = client.poll_build_status("app", triggered.number).await.unwrap();
        assert_eq!(status, BuildStatus::Unknown);

        let status = client.poll_build_status("app", 42).await.unwrap();
        assert_eq!(status, BuildStatus::Aborted);
    }

    #[tokio::test]
    async fn test_delete_missing_job_against_server() {
        let mut server = Server::new_async().await;
        let _crumb = no_crumb(&mut server).await;
        let _mock = server
            .mock("POST", "/job/ghost/doDelete")
            .with_status(404)
            .create_async()
            .await;

        let client = BuildTriggerClient::from_settings(&settings_for(&server)).unwrap();

        assert_eq!(client.delete_job("ghost").await, DeleteOutcome::NotFound);
    }
}
