//! Dispatch behavior across stages: ordering, barriers and failure handling.

mod common;

use common::*;
use scanner_core::orchestration::ScanTypeOutcome;
use scanner_core::registry::ToolInputType;
use scanner_core::{
    DispatchError, ExecutionPlanBuilder, HandlerRegistry, OrchestratorError, ScanOrchestrator,
    ScanType, StageDispatcher, StageMode,
};
use std::time::Duration;

const DISCOVERY_AND_VULN: &str = r#"
vuln_scan:
  tools:
    nuclei: { enabled: true }
subdomain_discovery:
  passive_tools:
    subfinder: { enabled: true }
port_scan:
  tools:
    naabu_active: { enabled: true }
site_scan:
  tools:
    httpx: { enabled: true }
"#;

const CONTENT_AND_VULN: &str = r#"
site_scan:
  tools:
    httpx: { enabled: true }
directory_scan:
  tools:
    ffuf: { enabled: true }
url_fetch:
  tools:
    waymore: { enabled: true }
    uro: { enabled: true }
vuln_scan:
  tools:
    dalfox_xss: { enabled: true }
"#;

#[tokio::test(start_paused = true)]
async fn test_full_engine_runs_stages_in_order_with_barriers() {
    let log = CallLog::new();
    let registry = HandlerRegistry::new()
        .with_handler(ScanType::SubdomainDiscovery, ScriptedHandler::succeeding(&log))
        .with_handler(ScanType::PortScan, ScriptedHandler::succeeding(&log))
        .with_handler(ScanType::SiteScan, ScriptedHandler::succeeding(&log))
        .with_handler(ScanType::FingerprintDetect, ScriptedHandler::succeeding(&log))
        .with_handler(
            ScanType::DirectoryScan,
            ScriptedHandler::succeeding(&log).with_delay(Duration::from_secs(30)),
        )
        .with_handler(
            ScanType::UrlFetch,
            ScriptedHandler::succeeding(&log).with_delay(Duration::from_secs(5)),
        )
        .with_handler(ScanType::VulnScan, ScriptedHandler::succeeding(&log));

    let orchestrator = ScanOrchestrator::new(registry);
    let result = tokio_test::assert_ok!(
        orchestrator
            .execute(&engine_fixture("full_scan.yaml"), &test_context())
            .await
    );

    assert!(result.is_success());
    assert_eq!(result.stages_completed, 3);
    assert!(result.finished_at.is_some());

    let started = log.started();
    assert_eq!(
        &started[..4],
        [
            ScanType::SubdomainDiscovery,
            ScanType::PortScan,
            ScanType::SiteScan,
            ScanType::FingerprintDetect,
        ]
    );
    assert_eq!(started.last(), Some(&ScanType::VulnScan));

    // content members overlap, vuln waits for the slower one
    let dir_start = log.position(CallEvent::Started(ScanType::DirectoryScan)).unwrap();
    let url_start = log.position(CallEvent::Started(ScanType::UrlFetch)).unwrap();
    let url_done = log.position(CallEvent::Finished(ScanType::UrlFetch)).unwrap();
    let dir_done = log.position(CallEvent::Finished(ScanType::DirectoryScan)).unwrap();
    let vuln_start = log.position(CallEvent::Started(ScanType::VulnScan)).unwrap();
    assert!(dir_start < url_done && url_start < url_done);
    assert!(url_done < dir_done);
    assert!(dir_done < vuln_start);

    // parallel results keep stage-table order, not completion order
    assert_eq!(
        result.executed_scan_types(),
        vec![
            ScanType::SubdomainDiscovery,
            ScanType::PortScan,
            ScanType::SiteScan,
            ScanType::FingerprintDetect,
            ScanType::DirectoryScan,
            ScanType::UrlFetch,
            ScanType::VulnScan,
        ]
    );
    let directory = result.get(ScanType::DirectoryScan).unwrap();
    assert_eq!(directory.mode, StageMode::Parallel);
    assert_eq!(directory.stage_index, 1);
    assert!(directory.duration >= Duration::from_secs(30));
}

#[tokio::test]
async fn test_sequential_failure_skips_rest_of_stage_and_later_stages() {
    let log = CallLog::new();
    let registry = HandlerRegistry::new()
        .with_handler(ScanType::SubdomainDiscovery, ScriptedHandler::succeeding(&log))
        .with_handler(
            ScanType::PortScan,
            ScriptedHandler::failing(&log, "naabu_active", "exit status 2"),
        )
        .with_handler(ScanType::SiteScan, ScriptedHandler::succeeding(&log))
        .with_handler(ScanType::VulnScan, ScriptedHandler::succeeding(&log));

    let plan = ExecutionPlanBuilder::new().build(DISCOVERY_AND_VULN).unwrap();
    let err = StageDispatcher::default()
        .run(&plan, &registry, &test_context())
        .await
        .unwrap_err();

    assert_eq!(log.started(), vec![ScanType::SubdomainDiscovery, ScanType::PortScan]);

    let partial = err.partial_result().expect("partial result").clone();
    match err {
        DispatchError::StageFailed {
            stage_index,
            stage_name,
            mode,
            failures,
            ..
        } => {
            assert_eq!(stage_index, 0);
            assert_eq!(stage_name, "discovery");
            assert_eq!(mode, StageMode::Sequential);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].scan_type, ScanType::PortScan);
            assert_eq!(failures[0].tool.as_deref(), Some("naabu_active"));
            assert_eq!(failures[0].error, "exit status 2");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(partial.stages_completed, 0);
    assert_eq!(
        partial.executed_scan_types(),
        vec![ScanType::SubdomainDiscovery, ScanType::PortScan]
    );
    assert!(partial.get(ScanType::SubdomainDiscovery).unwrap().outcome.is_success());
}

#[tokio::test(start_paused = true)]
async fn test_parallel_failure_does_not_cancel_siblings() {
    let log = CallLog::new();
    let registry = HandlerRegistry::new()
        .with_handler(ScanType::SiteScan, ScriptedHandler::succeeding(&log))
        .with_handler(
            ScanType::DirectoryScan,
            ScriptedHandler::failing(&log, "ffuf", "wordlist missing")
                .with_delay(Duration::from_secs(1)),
        )
        .with_handler(
            ScanType::UrlFetch,
            ScriptedHandler::succeeding(&log).with_delay(Duration::from_secs(10)),
        )
        .with_handler(ScanType::VulnScan, ScriptedHandler::succeeding(&log));

    let plan = ExecutionPlanBuilder::new().build(CONTENT_AND_VULN).unwrap();
    let err = StageDispatcher::default()
        .run(&plan, &registry, &test_context())
        .await
        .unwrap_err();

    // url_fetch ran to completion after its sibling failed
    assert!(log.position(CallEvent::Finished(ScanType::UrlFetch)).is_some());
    assert!(log.position(CallEvent::Started(ScanType::VulnScan)).is_none());

    let partial = err.partial_result().unwrap();
    assert_eq!(partial.stages_completed, 1);
    assert_eq!(
        partial.executed_scan_types(),
        vec![ScanType::SiteScan, ScanType::DirectoryScan, ScanType::UrlFetch]
    );
    assert!(partial.get(ScanType::UrlFetch).unwrap().outcome.is_success());
    assert_eq!(
        partial.get(ScanType::DirectoryScan).unwrap().outcome,
        ScanTypeOutcome::Failed {
            tool: Some("ffuf".to_string()),
            error: "wordlist missing".to_string(),
        }
    );

    assert!(matches!(
        err,
        DispatchError::StageFailed {
            stage_index: 1,
            mode: StageMode::Parallel,
            ref failures,
            ..
        } if failures.len() == 1 && failures[0].scan_type == ScanType::DirectoryScan
    ));
}

#[tokio::test]
async fn test_handlers_receive_tools_and_workspace() {
    let log = CallLog::new();
    let url_fetch = ScriptedHandler::succeeding(&log);
    let registry = succeeding_registry(&log).with_handler(ScanType::UrlFetch, url_fetch.clone());
    let context = test_context();

    let plan = ExecutionPlanBuilder::new().build(CONTENT_AND_VULN).unwrap();
    StageDispatcher::default()
        .run(&plan, &registry, &context)
        .await
        .unwrap();

    let requests = url_fetch.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.run.run_id, context.run_id);
    assert_eq!(request.stage_index, 1);
    assert_eq!(request.tools.keys().collect::<Vec<_>>(), ["uro", "waymore"]);
    assert_eq!(request.tools_with_input(ToolInputType::Endpoints), ["uro"]);
    assert_eq!(request.tools_with_input(ToolInputType::Target), ["waymore"]);
    assert_eq!(
        request.workspace_dir(),
        context.workspace_dir.join("url_fetch")
    );
}

#[tokio::test]
async fn test_missing_handler_runs_nothing() {
    let log = CallLog::new();
    let registry = HandlerRegistry::new()
        .with_handler(ScanType::SiteScan, ScriptedHandler::succeeding(&log))
        .with_handler(ScanType::DirectoryScan, ScriptedHandler::succeeding(&log))
        .with_handler(ScanType::VulnScan, ScriptedHandler::succeeding(&log));

    let err = ScanOrchestrator::new(registry)
        .execute(CONTENT_AND_VULN, &test_context())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OrchestratorError::Dispatch(DispatchError::MissingHandler {
            scan_type: ScanType::UrlFetch,
            stage_index: 1,
        })
    ));
    assert!(log.events().is_empty());
}
