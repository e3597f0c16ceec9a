//! Test fixtures and builders for the managed Azure resources.

use azure_managed_admission::crd::{
    AzureClusterIdentity, AzureClusterIdentitySpec, AzureMachine, AzureMachineSpec,
    AzureMachineTemplate, AzureMachineTemplateResource, AzureMachineTemplateSpec,
    AzureManagedCluster, AzureManagedClusterSpec, AzureManagedControlPlane,
    AzureManagedControlPlaneSpec, AzureManagedMachinePool, AzureManagedMachinePoolSpec,
    IdentityType, LoadBalancerProfile, NodePoolMode, SecretReference,
};
use azure_managed_admission::webhooks::{AdmissionRequest, AdmissionReview, Operation};
use kube::core::DynamicObject;
use serde::Serialize;
use serde_json::{Value, json};

/// A well-formed OpenSSH RSA public key.
pub const SSH_PUBLIC_KEY: &str = "ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABAQCBWPsnor40K1MDRVd3++N7AS9ta4Zy7Du9/rbDSTa2jaZl7m5u90pUbfAIlGKOA5MfZkfHSL3z95SOLv6+gy/JghG9+lFbeGC/4A5I90LH53NSqtgh+ZVYswmCkSjkxzPUIUfS9nuVXEfbQzz+sgHEwfmNRZ6K4GABXlx+IPGK8eei4aFG/2cDcBb5jtzAXOMSjfrG/brTukqMutRuqdGC0U5kwe+ju3YPtybvmTq47pS0KtDltNLLOvv3Un92uqGottjAKUZX04a1ocqcFxSoMzKw8H2n/OH2W/b3WJTmh+YE6e49umDuqHcSaRkLQK7aS9tgrQJdc1QA/b0KIlsR";

/// Builder for `AzureManagedControlPlane` fixtures.
///
/// # Example
/// ```ignore
/// let cp = ControlPlaneBuilder::new("fooName")
///     .version("1.17.5")
///     .dns_service_ip("10.0.0.10")
///     .build();
/// ```
#[derive(Clone, Debug)]
pub struct ControlPlaneBuilder {
    name: String,
    namespace: Option<String>,
    spec: Value,
}

impl ControlPlaneBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some("default".to_string()),
            spec: json!({
                "resourceGroupName": "fooRg",
                "location": "fooLocation",
                "version": "v1.17.5",
                "sshPublicKey": SSH_PUBLIC_KEY,
            }),
        }
    }

    fn set(mut self, key: &str, value: Value) -> Self {
        if let Some(spec) = self.spec.as_object_mut() {
            spec.insert(key.to_string(), value);
        }
        self
    }

    pub fn version(self, version: &str) -> Self {
        self.set("version", json!(version))
    }

    pub fn ssh_public_key(self, key: &str) -> Self {
        self.set("sshPublicKey", json!(key))
    }

    pub fn dns_service_ip(self, ip: &str) -> Self {
        self.set("dnsServiceIP", json!(ip))
    }

    pub fn endpoint(self, host: &str, port: i32) -> Self {
        self.set("controlPlaneEndpoint", json!({"host": host, "port": port}))
    }

    pub fn load_balancer_profile(self, profile: &LoadBalancerProfile) -> Self {
        let value = serde_json::to_value(profile).unwrap_or(Value::Null);
        self.set("loadBalancerProfile", value)
    }

    pub fn autoscaler(self, profile: Value) -> Self {
        self.set("autoscalerProfile", profile)
    }

    pub fn build(self) -> AzureManagedControlPlane {
        let spec: AzureManagedControlPlaneSpec =
            serde_json::from_value(self.spec).expect("control plane spec fixture");
        let mut cp = AzureManagedControlPlane::new(&self.name, spec);
        cp.metadata.namespace = self.namespace;
        cp
    }
}

pub fn cluster(name: &str) -> AzureManagedCluster {
    AzureManagedCluster::new(
        name,
        AzureManagedClusterSpec {
            location: "westeurope".to_string(),
            subscription_id: Some("00000000-0000-0000-0000-000000000000".to_string()),
            ..Default::default()
        },
    )
}

pub fn machine_pool(name: &str, mode: NodePoolMode) -> AzureManagedMachinePool {
    AzureManagedMachinePool::new(
        name,
        AzureManagedMachinePoolSpec {
            mode: Some(mode),
            sku: "Standard_D2s_v3".to_string(),
            ..Default::default()
        },
    )
}

pub fn machine_spec() -> AzureMachineSpec {
    let mut spec = AzureMachineSpec {
        vm_size: "Standard_D2s_v3".to_string(),
        ssh_public_key: SSH_PUBLIC_KEY.to_string(),
        ..Default::default()
    };
    spec.os_disk.os_type = "Linux".to_string();
    spec.os_disk.disk_size_gb = Some(128);
    spec
}

pub fn machine(name: &str) -> AzureMachine {
    AzureMachine::new(name, machine_spec())
}

pub fn machine_template(name: &str) -> AzureMachineTemplate {
    let mut spec = machine_spec();
    spec.ssh_public_key.clear();
    AzureMachineTemplate::new(
        name,
        AzureMachineTemplateSpec {
            template: AzureMachineTemplateResource { spec },
        },
    )
}

pub fn cluster_identity(name: &str) -> AzureClusterIdentity {
    AzureClusterIdentity::new(
        name,
        AzureClusterIdentitySpec {
            identity_type: IdentityType::ServicePrincipal,
            client_id: "client".to_string(),
            tenant_id: "tenant".to_string(),
            resource_id: None,
            client_secret: Some(SecretReference {
                name: "sp-secret".to_string(),
                namespace: Some("default".to_string()),
            }),
            allowed_namespaces: None,
        },
    )
}

fn operation_str(operation: &Operation) -> &'static str {
    match operation {
        Operation::Create => "CREATE",
        Operation::Update => "UPDATE",
        Operation::Delete => "DELETE",
        Operation::Connect => "CONNECT",
    }
}

/// Build an admission request the way the API server would send it.
pub fn admission_request<T: Serialize>(
    kind: &str,
    operation: Operation,
    object: Option<&T>,
    old_object: Option<&T>,
) -> AdmissionRequest<DynamicObject> {
    let to_value = |obj: Option<&T>| obj.map(|o| serde_json::to_value(o).expect("fixture serializes"));
    let name = object
        .or(old_object)
        .and_then(|o| serde_json::to_value(o).ok())
        .and_then(|v| v["metadata"]["name"].as_str().map(str::to_string))
        .unwrap_or_default();

    let review = json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
            "kind": {"group": "infrastructure.cluster.x-k8s.io", "version": "v1beta1", "kind": kind},
            "resource": {
                "group": "infrastructure.cluster.x-k8s.io",
                "version": "v1beta1",
                "resource": format!("{}s", kind.to_lowercase()),
            },
            "name": name,
            "namespace": "default",
            "operation": operation_str(&operation),
            "userInfo": {"username": "admin"},
            "object": to_value(object),
            "oldObject": to_value(old_object),
            "dryRun": false,
        }
    });
    let review: AdmissionReview<DynamicObject> =
        serde_json::from_value(review).expect("admission review fixture");
    review.try_into().expect("review carries a request")
}
