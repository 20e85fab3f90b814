// tests/http_routes.rs

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::header::CONTENT_TYPE;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use runner_bridge::config::{ConfigFile, load_or_default, resolve_base_dir};
use runner_bridge::exec::{ProcessBackend, RunnerBackend, RunnerSettings};
use runner_bridge::server::{BridgeState, build_router};
use runner_bridge_test_utils::builders::ConfigFileBuilder;
use runner_bridge_test_utils::fake_backend::FakeBackend;
use runner_bridge_test_utils::scripts::{ECHO_RUNNER, RunnerDir, SLEEPY_RUNNER};
use runner_bridge_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn router_with(cfg: &ConfigFile, base_dir: &Path, backend: Arc<dyn RunnerBackend>) -> Router {
    let state = BridgeState::from_config(cfg, base_dir.to_path_buf(), backend);
    build_router(Arc::new(state))
}

fn process_router(cfg: &ConfigFile, base_dir: &Path) -> Router {
    let backend =
        ProcessBackend::new(RunnerSettings::from_config(&cfg.runner).with_install(&cfg.packs));
    router_with(cfg, base_dir, Arc::new(backend))
}

async fn post(app: Router, uri: &str, body: impl Into<Body>) -> Result<(StatusCode, Value), Box<dyn Error>> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())?;
    send(app, request).await
}

async fn get(app: Router, uri: &str) -> Result<(StatusCode, Value), Box<dyn Error>> {
    let request = Request::builder().method("GET").uri(uri).body(Body::empty())?;
    send(app, request).await
}

async fn send(app: Router, request: Request<Body>) -> Result<(StatusCode, Value), Box<dyn Error>> {
    let response = app.oneshot(request).await?;
    let status = response.status();
    assert_eq!(
        response.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        Some("application/json; charset=utf-8"),
        "every response is JSON"
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, serde_json::from_slice(&bytes)?))
}

#[tokio::test]
async fn run_relays_body_through_the_runner() -> TestResult {
    init_tracing();
    with_timeout(async {
        let dir = RunnerDir::new();
        dir.write_runner(ECHO_RUNNER);
        let cfg = ConfigFileBuilder::sh_runner().build();

        let request = json!({ "payload": { "model": "llama3", "prompt": "hi" } });
        let (status, body) = post(
            process_router(&cfg, dir.path()),
            "/run",
            serde_json::to_vec(&request)?,
        )
        .await?;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, request);
        Ok(())
    })
    .await
}

#[tokio::test]
async fn missing_runner_script_is_500() -> TestResult {
    init_tracing();
    with_timeout(async {
        let dir = RunnerDir::new();
        let cfg = ConfigFileBuilder::sh_runner().build();

        let (status, body) = post(process_router(&cfg, dir.path()), "/run", "{}").await?;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "runner.sh not found" }));
        Ok(())
    })
    .await
}

#[tokio::test]
async fn missing_interpreter_is_500() -> TestResult {
    init_tracing();
    with_timeout(async {
        let dir = RunnerDir::new();
        dir.write_runner(ECHO_RUNNER);
        let cfg = ConfigFileBuilder::sh_runner()
            .with_interpreters(&["definitely-not-an-interpreter-7f3a"])
            .build();

        let (status, body) = post(process_router(&cfg, dir.path()), "/run", "{}").await?;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "No Python interpreter found on server" }));
        Ok(())
    })
    .await
}

#[tokio::test]
async fn timeout_is_504() -> TestResult {
    init_tracing();
    with_timeout(async {
        let dir = RunnerDir::new();
        dir.write_runner(SLEEPY_RUNNER);
        let cfg = ConfigFileBuilder::sh_runner().with_timeout("300ms").build();

        let (status, body) = post(process_router(&cfg, dir.path()), "/run", "{}").await?;

        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["error"], "runner timeout");
        assert!(body["stderr"].as_str().unwrap_or_default().starts_with("pid="));
        Ok(())
    })
    .await
}

#[tokio::test]
async fn runner_failure_without_output_is_500_with_code() -> TestResult {
    init_tracing();
    with_timeout(async {
        let dir = RunnerDir::new();
        dir.write_runner("echo boom >&2\nexit 1\n");
        let cfg = ConfigFileBuilder::sh_runner().build();

        let (status, body) = post(process_router(&cfg, dir.path()), "/run", "{}").await?;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            json!({ "error": "runner exited with error", "code": 1, "stderr": "boom\n" })
        );
        Ok(())
    })
    .await
}

#[tokio::test]
async fn runner_reported_error_json_is_passed_through_as_200() -> TestResult {
    init_tracing();
    with_timeout(async {
        let dir = RunnerDir::new();
        dir.write_runner("printf '{\"error\":\"model not pulled\"}'\nexit 2\n");
        let cfg = ConfigFileBuilder::sh_runner().build();

        let (status, body) = post(process_router(&cfg, dir.path()), "/run", "{}").await?;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "error": "model not pulled" }));
        Ok(())
    })
    .await
}

#[tokio::test]
async fn invalid_runner_json_carries_raw_output() -> TestResult {
    init_tracing();
    with_timeout(async {
        let dir = RunnerDir::new();
        dir.write_runner("printf 'oops'\n");
        let cfg = ConfigFileBuilder::sh_runner().build();

        let (status, body) = post(process_router(&cfg, dir.path()), "/run", "{}").await?;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            json!({ "error": "invalid JSON from runner", "raw": "oops", "stderr": "" })
        );
        Ok(())
    })
    .await
}

#[tokio::test]
async fn empty_body_is_rejected_without_running_anything() -> TestResult {
    init_tracing();
    let dir = RunnerDir::new();
    let cfg = ConfigFileBuilder::sh_runner().build();
    let backend = FakeBackend::echo();

    let (status, body) = post(
        router_with(&cfg, dir.path(), Arc::new(backend.clone())),
        "/run",
        "  \n",
    )
    .await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "No input" }));
    assert!(backend.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn oversized_body_is_400() -> TestResult {
    init_tracing();
    let dir = RunnerDir::new();
    let cfg = ConfigFileBuilder::sh_runner().with_max_body_bytes(16).build();
    let backend = FakeBackend::echo();

    let (status, body) = post(
        router_with(&cfg, dir.path(), Arc::new(backend.clone())),
        "/run",
        r#"{"prompt":"this is longer than sixteen bytes"}"#,
    )
    .await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "failed to read request body" }));
    assert!(backend.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn body_is_forwarded_byte_for_byte() -> TestResult {
    init_tracing();
    let dir = RunnerDir::new();
    let cfg = ConfigFileBuilder::sh_runner().build();
    let backend = FakeBackend::echo();
    let raw = "{ \"b\" : 2,\n  \"a\" : 1 }";

    let (status, _) = post(
        router_with(&cfg, dir.path(), Arc::new(backend.clone())),
        "/run",
        raw,
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, raw.as_bytes());
    assert_eq!(calls[0].0.workdir, dir.path());
    assert_eq!(calls[0].0.script, dir.path().join("runner.sh"));
    Ok(())
}

#[tokio::test]
async fn pack_requests_run_the_pack_runner_in_the_pack_dir() -> TestResult {
    init_tracing();
    with_timeout(async {
        let dir = RunnerDir::new();
        dir.write_script(
            "packs/gridflow-ollama/runner.sh",
            "printf '{\"pack\":\"%s\"}' \"$(basename \"$(pwd)\")\"\n",
        );
        let cfg = ConfigFileBuilder::sh_runner().with_packs_root("packs").build();

        let (status, body) = post(
            process_router(&cfg, dir.path()),
            "/packs/gridflow-ollama/run",
            "{}",
        )
        .await?;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "pack": "gridflow-ollama" }));
        Ok(())
    })
    .await
}

#[tokio::test]
async fn unknown_and_invalid_packs_are_rejected() -> TestResult {
    init_tracing();
    let dir = RunnerDir::new();
    dir.write_script("packs/demo/runner.sh", ECHO_RUNNER);
    let cfg = ConfigFileBuilder::sh_runner().with_packs_root("packs").build();
    let backend = FakeBackend::echo();
    let app = router_with(&cfg, dir.path(), Arc::new(backend.clone()));

    let (status, body) = post(app.clone(), "/packs/nope/run", "{}").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "pack not found" }));

    let (status, body) = post(app, "/packs/%24%24/run", "{}").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Invalid pack" }));

    assert!(backend.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn packs_are_listed_from_their_manifests() -> TestResult {
    init_tracing();
    let dir = RunnerDir::new();
    dir.write_script("packs/zeta/runner.sh", ECHO_RUNNER);
    dir.write_script(
        "packs/zeta/manifest.json",
        r#"{ "name": "Zeta", "version": "1.2.0", "nodes": [{ "type": "zeta.echo" }] }"#,
    );
    dir.write_script("packs/zeta/requirements.txt", "requests==2.32.0\n");
    dir.write_script("packs/alpha/manifest.json", "{}");
    dir.write_script("packs/no-manifest/runner.sh", ECHO_RUNNER);
    dir.write_script("packs/broken/manifest.json", "not json");
    dir.write_script("packs/loose-file.txt", "not a pack");
    let cfg = ConfigFileBuilder::sh_runner().with_packs_root("packs").build();

    let (status, body) = get(
        router_with(&cfg, dir.path(), Arc::new(FakeBackend::echo())),
        "/packs",
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    let expected_hash = blake3::hash(b"requests==2.32.0\n").to_hex().to_string();
    assert_eq!(
        body,
        json!({ "packs": [
            {
                "slug": "alpha",
                "name": "alpha",
                "version": "0.0.0",
                "runner": null,
                "has_requirements": false,
                "requirements_hash": null,
                "nodes": [],
            },
            {
                "slug": "zeta",
                "name": "Zeta",
                "version": "1.2.0",
                "runner": "runner.sh",
                "has_requirements": true,
                "requirements_hash": expected_hash,
                "nodes": [{
                    "type": "zeta.echo",
                    "title": "zeta.echo",
                    "pack": "Zeta",
                    "slug": "zeta",
                    "runner": "runner.sh",
                    "inspector": [],
                    "inputs": [],
                    "outputs": [],
                }],
            },
        ]})
    );
    Ok(())
}

#[tokio::test]
async fn missing_packs_root_lists_nothing() -> TestResult {
    init_tracing();
    let dir = RunnerDir::new();
    let cfg = ConfigFileBuilder::sh_runner().with_packs_root("custom-nodes").build();

    let (status, body) = get(
        router_with(&cfg, dir.path(), Arc::new(FakeBackend::echo())),
        "/packs",
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "packs": [] }));
    Ok(())
}

#[tokio::test]
async fn install_runs_the_installer_in_the_pack_dir() -> TestResult {
    init_tracing();
    with_timeout(async {
        let dir = RunnerDir::new();
        dir.write_script("packs/demo/requirements.txt", "requests==2.32.0\n");
        let cfg = ConfigFileBuilder::sh_runner()
            .with_packs_root("packs")
            .with_install_args(&[
                "-c",
                "echo \"in $(basename \"$(pwd)\")\"; cat \"$1\"",
                "pip",
                "{requirements}",
            ])
            .build();

        let (status, body) = post(process_router(&cfg, dir.path()), "/packs/demo/install", "").await?;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "ok": true, "log": "in demo\nrequests==2.32.0\n", "code": 0 })
        );
        Ok(())
    })
    .await
}

#[tokio::test]
async fn failed_install_reports_exit_code_and_output() -> TestResult {
    init_tracing();
    with_timeout(async {
        let dir = RunnerDir::new();
        dir.write_script("packs/demo/requirements.txt", "nope==0\n");
        let cfg = ConfigFileBuilder::sh_runner()
            .with_packs_root("packs")
            .with_install_args(&["-c", "echo collecting; echo 'no matching dist' >&2; exit 3"])
            .build();

        let (status, body) = post(process_router(&cfg, dir.path()), "/packs/demo/install", "").await?;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "ok": false,
                "error": "pip exited with 3",
                "log": "collecting\n",
                "stderr": "no matching dist\n",
                "code": 3,
            })
        );
        Ok(())
    })
    .await
}

#[tokio::test]
async fn install_timeout_is_504() -> TestResult {
    init_tracing();
    with_timeout(async {
        let dir = RunnerDir::new();
        dir.write_script("packs/demo/requirements.txt", "slow==1\n");
        let cfg = ConfigFileBuilder::sh_runner()
            .with_packs_root("packs")
            .with_install_args(&["-c", "exec sleep 30"])
            .with_install_timeout("300ms")
            .build();

        let (status, body) = post(process_router(&cfg, dir.path()), "/packs/demo/install", "").await?;

        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body, json!({ "ok": false, "error": "pip timeout", "stderr": "" }));
        Ok(())
    })
    .await
}

#[tokio::test]
async fn install_rejects_missing_requirements_and_unknown_packs() -> TestResult {
    init_tracing();
    let dir = RunnerDir::new();
    dir.write_script("packs/demo/runner.sh", ECHO_RUNNER);
    let cfg = ConfigFileBuilder::sh_runner().with_packs_root("packs").build();
    let backend = FakeBackend::echo();
    let app = router_with(&cfg, dir.path(), Arc::new(backend.clone()));

    let (status, body) = post(app.clone(), "/packs/demo/install", "").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "ok": false, "error": "No requirements.txt" }));

    let (status, body) = post(app.clone(), "/packs/nope/install", "").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "ok": false, "error": "pack not found" }));

    let (status, body) = post(app, "/packs/%2E%2E/install", "").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "ok": false, "error": "Invalid pack" }));

    assert!(backend.installs().is_empty());
    Ok(())
}

#[tokio::test]
async fn relative_config_path_still_runs_the_default_runner() -> TestResult {
    init_tracing();
    with_timeout(async {
        // Integration tests run from the package root, so this directory is
        // reachable through a relative path.
        let dir = tempfile::Builder::new()
            .prefix("relative-bridge-")
            .tempdir_in(".")?;
        let rel = PathBuf::from(dir.path().file_name().ok_or("temp dir has a name")?);
        fs::write(rel.join("runner.sh"), ECHO_RUNNER)?;
        fs::write(
            rel.join("RunnerBridge.toml"),
            "[runner]\ninterpreters = [\"sh\"]\nprobe_args = [\"-c\", \"exit 0\"]\nscript = \"runner.sh\"\n",
        )?;

        let (cfg, config_path) = load_or_default(Some(&rel.join("RunnerBridge.toml")))?;
        let base_dir = resolve_base_dir(&config_path, &cfg)?;
        assert!(base_dir.is_absolute());

        let (status, body) = post(process_router(&cfg, &base_dir), "/run", r#"{"n":1}"#).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "n": 1 }));

        // A relative base directory handed straight to the state works too.
        let (status, body) = post(process_router(&cfg, &rel), "/run", r#"{"n":2}"#).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "n": 2 }));
        Ok(())
    })
    .await
}

#[tokio::test]
async fn packs_disabled_without_root() -> TestResult {
    init_tracing();
    let dir = RunnerDir::new();
    let cfg = ConfigFileBuilder::sh_runner().build();
    let app = router_with(&cfg, dir.path(), Arc::new(FakeBackend::echo()));

    let (status, body) = get(app.clone(), "/packs").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "packs": [] }));

    let (status, _) = post(app, "/packs/demo/run", "{}").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn health_reports_ok() -> TestResult {
    init_tracing();
    let dir = RunnerDir::new();
    let cfg = ConfigFileBuilder::sh_runner().build();

    let (status, body) = get(
        router_with(&cfg, dir.path(), Arc::new(FakeBackend::echo())),
        "/health",
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
    Ok(())
}
