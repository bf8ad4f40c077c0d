//! Policy Documents
//!
//! Builds the trust and execution policy documents attached to an
//! execution identity. The orchestrator treats these as opaque
//! payloads; it transmits them but never reasons about their content.

use serde_json::{json, Value};

/// Deterministic identity name for an agent. This doubles as the
/// idempotency key: at most one identity per agent name exists remotely.
pub fn identity_name(agent_name: &str) -> String {
    format!("AgentRuntimeRole-{}", agent_name)
}

/// Name of the inline execution policy attached to an identity.
pub fn execution_policy_name(identity_name: &str) -> String {
    format!("{}-execution", identity_name)
}

/// Trust policy scoping assume rights to the deployment service.
pub fn trust_policy(region: &str) -> Value {
    json!({
        "version": "2024-06-01",
        "statement": [
            {
                "effect": "allow",
                "principal": { "service": "runtime.skyhook.dev" },
                "action": "identity:Assume",
                "condition": {
                    "region_equals": { "skyhook:region": region }
                }
            }
        ]
    })
}

/// Execution policy granting only what the runtime needs at call
/// time: inference invocation, log read/write, execution-sandbox
/// lifecycle calls, and workload credential issuance.
pub fn execution_policy(region: &str, agent_name: &str) -> Value {
    json!({
        "version": "2024-06-01",
        "statement": [
            {
                "sid": "InferenceInvocation",
                "effect": "allow",
                "action": [
                    "inference:Invoke",
                    "inference:InvokeWithResponseStream"
                ],
                "resource": "*"
            },
            {
                "sid": "RuntimeLogs",
                "effect": "allow",
                "action": [
                    "logs:DescribeStreams",
                    "logs:CreateStream",
                    "logs:PutEvents"
                ],
                "resource": format!("srn:skyhook:logs:{}:runtime/{}/*", region, agent_name)
            },
            {
                "sid": "SandboxLifecycle",
                "effect": "allow",
                "action": [
                    "sandbox:CreateInterpreter",
                    "sandbox:StartSession",
                    "sandbox:Invoke",
                    "sandbox:StopSession",
                    "sandbox:DeleteInterpreter"
                ],
                "resource": format!("srn:skyhook:sandbox:{}:*", region)
            },
            {
                "sid": "WorkloadCredentials",
                "effect": "allow",
                "action": [
                    "identity:GetWorkloadAccessToken"
                ],
                "resource": format!("srn:skyhook:identity:{}:workload/{}-*", region, agent_name)
            }
        ]
    })
}
