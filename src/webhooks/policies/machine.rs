//! AzureMachine defaulting and validation.
//!
//! `default_machine_spec` and `validate_machine_spec` are shared with the
//! machine template, which differs only in never generating per-instance
//! values (SSH key, role assignment name).

use std::collections::BTreeSet;

use super::{
    AdmissionContext, AdmissionPolicy, DefaultingContext, ValidationResult, check_bounds,
    normalized, serialized,
};
use crate::crd::{AzureMachine, AzureMachineSpec, CACHING_TYPES, ImageVariant, OsType, VmIdentity};
use crate::error::Result;
use crate::validation::format;
use crate::validation::immutability::{self, Rule};
use crate::validation::{ErrorList, FieldError, FieldPath, Mutability};
use crate::webhooks::keygen;

pub const DEFAULT_OS_DISK_CACHING: &str = "None";
pub const DEFAULT_DATA_DISK_CACHING: &str = "ReadWrite";

pub const MACHINE_RULES: &[Rule] = &[
    Rule::immutable("image"),
    Rule::immutable("identity"),
    Rule::immutable("userAssignedIdentities"),
    Rule::immutable("osDisk"),
    Rule::immutable("dataDisks"),
    Rule::immutable("vmSize"),
    Rule::immutable("failureDomain"),
    Rule::immutable("allocatePublicIP"),
    Rule::immutable("enableIPForwarding"),
    Rule::once_set("roleAssignmentName"),
    Rule::once_set("systemAssignedIdentityRole"),
];

/// Whether this spec belongs to a template rather than a live machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpecOwner {
    Machine,
    Template,
}

pub fn default_machine_spec(
    spec: &mut AzureMachineSpec,
    owner: SpecOwner,
    ctx: &DefaultingContext<'_>,
) -> Result<()> {
    if spec.os_disk.caching_type.is_empty() {
        spec.os_disk.caching_type = DEFAULT_OS_DISK_CACHING.to_string();
    }
    for disk in spec.data_disks.iter_mut() {
        if disk.caching_type.is_empty() {
            disk.caching_type = DEFAULT_DATA_DISK_CACHING.to_string();
        }
    }

    if owner == SpecOwner::Template || !ctx.generates() {
        return Ok(());
    }

    if spec.ssh_public_key.is_empty() {
        spec.ssh_public_key = keygen::generate_ssh_public_key()?;
    }
    if spec.identity == VmIdentity::SystemAssigned
        && spec.role_assignment_name.as_deref().is_none_or(str::is_empty)
    {
        spec.role_assignment_name = Some(uuid::Uuid::new_v4().to_string());
    }
    Ok(())
}

fn validate_caching_type(value: &str, path: &FieldPath) -> Option<FieldError> {
    if value.is_empty() {
        None
    } else {
        format::one_of(value, CACHING_TYPES, path)
    }
}

fn validate_image(spec: &AzureMachineSpec, root: &FieldPath, errors: &mut ErrorList) {
    let Some(image) = &spec.image else {
        return;
    };
    let path = root.child("image");
    match image.variant() {
        Err(count) => errors.push(FieldError::conflict(
            &path,
            format!(
                "exactly one of id, sharedGallery and marketplace must be set, found {}",
                count
            ),
        )),
        Ok(ImageVariant::ById(id)) => {
            if id.is_empty() {
                errors.push(FieldError::required(&path.child("id"), "image ID is required"));
            }
        }
        Ok(ImageVariant::SharedGallery(gallery)) => {
            let gallery_path = path.child("sharedGallery");
            for (name, value) in gallery.fields() {
                if value.is_empty() {
                    errors.push(FieldError::required(&gallery_path.child(name), "field is required"));
                }
            }
        }
        Ok(ImageVariant::Marketplace(marketplace)) => {
            let marketplace_path = path.child("marketplace");
            for (name, value) in marketplace.fields() {
                if value.is_empty() {
                    errors.push(FieldError::required(&marketplace_path.child(name), "field is required"));
                }
            }
        }
    }
}

fn validate_identity(spec: &AzureMachineSpec, root: &FieldPath, owner: SpecOwner, errors: &mut ErrorList) {
    let identities = root.child("userAssignedIdentities");
    match spec.identity {
        VmIdentity::UserAssigned => {
            if spec.user_assigned_identities.is_empty() {
                errors.push(FieldError::required(
                    &identities,
                    "at least one user-assigned identity is required",
                ));
            }
            for (i, identity) in spec.user_assigned_identities.iter().enumerate() {
                if identity.provider_id.is_empty() {
                    errors.push(FieldError::required(
                        &identities.index(i).child("providerID"),
                        "provider ID is required",
                    ));
                }
            }
        }
        _ if !spec.user_assigned_identities.is_empty() => {
            errors.push(FieldError::conflict(
                &identities,
                "user-assigned identities require identity 'UserAssigned'",
            ));
        }
        _ => {}
    }

    let role_name = spec.role_assignment_name.as_deref().unwrap_or_default();
    if !role_name.is_empty() {
        let path = root.child("roleAssignmentName");
        if owner == SpecOwner::Template {
            errors.push(FieldError::forbidden(
                &path,
                "role assignment name must not be set on a template; it is generated per machine",
            ));
        } else if spec.identity != VmIdentity::SystemAssigned {
            errors.push(FieldError::conflict(
                &path,
                "role assignment name requires identity 'SystemAssigned'",
            ));
        }
    }
    if spec.system_assigned_identity_role.is_some() && spec.identity != VmIdentity::SystemAssigned {
        errors.push(FieldError::conflict(
            &root.child("systemAssignedIdentityRole"),
            "system-assigned identity role requires identity 'SystemAssigned'",
        ));
    }
}

fn validate_disks(spec: &AzureMachineSpec, root: &FieldPath, errors: &mut ErrorList) {
    let os_disk = root.child("osDisk");
    errors.extend(format::one_of(
        &spec.os_disk.os_type,
        &[OsType::Linux.as_str(), OsType::Windows.as_str()],
        &os_disk.child("osType"),
    ));
    check_bounds(errors, spec.os_disk.disk_size_gb, 1, 4095, &os_disk.child("diskSizeGB"));
    errors.extend(validate_caching_type(
        &spec.os_disk.caching_type,
        &os_disk.child("cachingType"),
    ));
    if let Some(settings) = &spec.os_disk.diff_disk_settings {
        errors.extend(format::one_of(
            &settings.option,
            &["Local"],
            &os_disk.child("diffDiskSettings").child("option"),
        ));
        if spec.os_disk.caching_type != "ReadOnly" {
            errors.push(FieldError::conflict(
                &os_disk.child("cachingType"),
                "ephemeral OS disks require caching type 'ReadOnly'",
            ));
        }
    }

    let data_disks = root.child("dataDisks");
    let mut names = BTreeSet::new();
    let mut luns = BTreeSet::new();
    for (i, disk) in spec.data_disks.iter().enumerate() {
        let path = data_disks.index(i);
        if disk.name_suffix.is_empty() {
            errors.push(FieldError::required(&path.child("nameSuffix"), "name suffix is required"));
        } else if !names.insert(disk.name_suffix.as_str()) {
            errors.push(FieldError::invalid(
                &path.child("nameSuffix"),
                &disk.name_suffix,
                "data disk names must be unique",
            ));
        }
        errors.extend(format::bounded(
            i64::from(disk.disk_size_gb),
            4,
            32767,
            &path.child("diskSizeGB"),
        ));
        match disk.lun {
            None => errors.push(FieldError::required(&path.child("lun"), "LUN is required")),
            Some(lun) => {
                errors.extend(format::bounded(i64::from(lun), 0, 63, &path.child("lun")));
                if !luns.insert(lun) {
                    errors.push(FieldError::invalid(&path.child("lun"), lun, "LUNs must be unique"));
                }
            }
        }
        errors.extend(validate_caching_type(&disk.caching_type, &path.child("cachingType")));
    }
}

fn validate_network_interfaces(spec: &AzureMachineSpec, root: &FieldPath, errors: &mut ErrorList) {
    if spec.network_interfaces.is_empty() {
        return;
    }
    if !spec.subnet_name.is_empty() {
        errors.push(FieldError::conflict(
            &root.child("subnetName"),
            "subnetName cannot be set together with networkInterfaces",
        ));
    }
    if spec.accelerated_networking.is_some() {
        errors.push(FieldError::conflict(
            &root.child("acceleratedNetworking"),
            "acceleratedNetworking cannot be set together with networkInterfaces",
        ));
    }
    let interfaces = root.child("networkInterfaces");
    for (i, nic) in spec.network_interfaces.iter().enumerate() {
        if nic.private_ip_configs < 1 {
            errors.push(FieldError::invalid(
                &interfaces.index(i).child("privateIPConfigs"),
                nic.private_ip_configs,
                "must be at least 1",
            ));
        }
    }
}

/// Create-time rules for a machine spec rooted at `root`.
pub fn validate_machine_spec(spec: &AzureMachineSpec, root: &FieldPath, owner: SpecOwner) -> ValidationResult {
    let mut errors = ErrorList::new();
    let mut warnings = Vec::new();

    if spec.vm_size.is_empty() {
        errors.push(FieldError::required(&root.child("vmSize"), "VM size is required"));
    }

    let ssh_path = root.child("sshPublicKey");
    match owner {
        SpecOwner::Machine => errors.extend(format::ssh_public_key(&spec.ssh_public_key, &ssh_path)),
        SpecOwner::Template if !spec.ssh_public_key.is_empty() => {
            errors.extend(format::ssh_public_key(&spec.ssh_public_key, &ssh_path));
        }
        SpecOwner::Template => {}
    }

    validate_image(spec, root, &mut errors);
    validate_identity(spec, root, owner, &mut errors);
    validate_disks(spec, root, &mut errors);
    validate_network_interfaces(spec, root, &mut errors);

    if !spec.subnet_name.is_empty() || spec.accelerated_networking.is_some() {
        warnings.push(format!(
            "{} and {} are deprecated; use {} instead",
            root.child("subnetName"),
            root.child("acceleratedNetworking"),
            root.child("networkInterfaces")
        ));
    }

    ValidationResult::new(errors, warnings)
}

impl AdmissionPolicy for AzureMachine {
    fn apply_defaults(&mut self, ctx: &DefaultingContext<'_>) -> Result<()> {
        default_machine_spec(&mut self.spec, SpecOwner::Machine, ctx)
    }

    fn validate_create(&self, _ctx: &AdmissionContext<'_>) -> ValidationResult {
        validate_machine_spec(&self.spec, &FieldPath::new("spec"), SpecOwner::Machine)
    }

    fn validate_update(&self, old: &Self, _ctx: &AdmissionContext<'_>) -> ValidationResult {
        let path = FieldPath::new("spec");
        let (old, new) = match (normalized(old), normalized(self)) {
            (Ok(old), Ok(new)) => (old, new),
            (Err(err), _) | (_, Err(err)) => return ValidationResult::from(err),
        };
        let (old_value, new_value) = match (serialized(&old.spec, &path), serialized(&new.spec, &path)) {
            (Ok(o), Ok(n)) => (o, n),
            (Err(err), _) | (_, Err(err)) => return ValidationResult::from(err),
        };

        let mut errors = immutability::check(&old_value, &new_value, &path, MACHINE_RULES);
        errors.extend(immutability::network_interfaces(
            &old_value,
            &new_value,
            &path,
            Mutability::ImmutableOnceSet,
        ));
        validate_network_interfaces(&new.spec, &path, &mut errors);

        if old.spec.ssh_public_key != new.spec.ssh_public_key {
            let detail = if new.spec.ssh_public_key.is_empty() {
                "removing SSH key is not allowed"
            } else {
                "field is immutable"
            };
            errors.push(FieldError::forbidden(&path.child("sshPublicKey"), detail));
        }
        ValidationResult::from(errors)
    }
}
