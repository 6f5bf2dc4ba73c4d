use std::fmt;
use std::str::FromStr;

use crate::services::cloud::Service;

/// Resource types the portal knows how to delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    AnalyticsInstance,
    Instance,
    DedicatedVmHost,
    Image,
    BootVolume,
    BootVolumeBackup,
    Volume,
    VolumeBackup,
    VolumeBackupPolicy,
    VolumeGroup,
    VolumeGroupBackup,
    AutonomousDatabase,
    DbSystem,
    IntegrationInstance,
    Bastion,
    OdaInstance,
}

/// Where the delete call for a kind lives: `<service>/<version>/<collection>/<id>?<query>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteRoute {
    pub service: Service,
    pub version: &'static str,
    pub collection: &'static str,
    pub query: &'static [(&'static str, &'static str)],
}

const fn route(service: Service, version: &'static str, collection: &'static str) -> DeleteRoute {
    DeleteRoute {
        service,
        version,
        collection,
        query: &[],
    }
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 16] = [
        ResourceKind::AnalyticsInstance,
        ResourceKind::Instance,
        ResourceKind::DedicatedVmHost,
        ResourceKind::Image,
        ResourceKind::BootVolume,
        ResourceKind::BootVolumeBackup,
        ResourceKind::Volume,
        ResourceKind::VolumeBackup,
        ResourceKind::VolumeBackupPolicy,
        ResourceKind::VolumeGroup,
        ResourceKind::VolumeGroupBackup,
        ResourceKind::AutonomousDatabase,
        ResourceKind::DbSystem,
        ResourceKind::IntegrationInstance,
        ResourceKind::Bastion,
        ResourceKind::OdaInstance,
    ];

    /// Name as the search service reports it in `resourceType`.
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::AnalyticsInstance => "AnalyticsInstance",
            ResourceKind::Instance => "Instance",
            ResourceKind::DedicatedVmHost => "DedicatedVmHost",
            ResourceKind::Image => "Image",
            ResourceKind::BootVolume => "BootVolume",
            ResourceKind::BootVolumeBackup => "BootVolumeBackup",
            ResourceKind::Volume => "Volume",
            ResourceKind::VolumeBackup => "VolumeBackup",
            ResourceKind::VolumeBackupPolicy => "VolumeBackupPolicy",
            ResourceKind::VolumeGroup => "VolumeGroup",
            ResourceKind::VolumeGroupBackup => "VolumeGroupBackup",
            ResourceKind::AutonomousDatabase => "AutonomousDatabase",
            ResourceKind::DbSystem => "DbSystem",
            ResourceKind::IntegrationInstance => "IntegrationInstance",
            ResourceKind::Bastion => "Bastion",
            ResourceKind::OdaInstance => "OdaInstance",
        }
    }

    pub fn delete_route(self) -> DeleteRoute {
        const IAAS: &str = "20160918";
        match self {
            ResourceKind::Instance => DeleteRoute {
                query: &[("preserveBootVolume", "true")],
                ..route(Service::Iaas, IAAS, "instances")
            },
            ResourceKind::DedicatedVmHost => route(Service::Iaas, IAAS, "dedicatedVmHosts"),
            ResourceKind::Image => route(Service::Iaas, IAAS, "images"),
            ResourceKind::BootVolume => route(Service::Iaas, IAAS, "bootVolumes"),
            ResourceKind::BootVolumeBackup => route(Service::Iaas, IAAS, "bootVolumeBackups"),
            ResourceKind::Volume => route(Service::Iaas, IAAS, "volumes"),
            ResourceKind::VolumeBackup => route(Service::Iaas, IAAS, "volumeBackups"),
            ResourceKind::VolumeBackupPolicy => route(Service::Iaas, IAAS, "volumeBackupPolicies"),
            ResourceKind::VolumeGroup => route(Service::Iaas, IAAS, "volumeGroups"),
            ResourceKind::VolumeGroupBackup => route(Service::Iaas, IAAS, "volumeGroupBackups"),
            ResourceKind::AutonomousDatabase => {
                route(Service::Database, "20160918", "autonomousDatabases")
            }
            ResourceKind::DbSystem => route(Service::Database, "20160918", "dbSystems"),
            ResourceKind::AnalyticsInstance => {
                route(Service::Analytics, "20190331", "analyticsInstances")
            }
            ResourceKind::IntegrationInstance => {
                route(Service::Integration, "20190131", "integrationInstances")
            }
            ResourceKind::Bastion => route(Service::Bastion, "20210331", "bastions"),
            ResourceKind::OdaInstance => {
                route(Service::DigitalAssistant, "20190506", "odaInstances")
            }
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported resource type {0}")]
pub struct UnsupportedKind(pub String);

impl FromStr for ResourceKind {
    type Err = UnsupportedKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnsupportedKind(s.to_string()))
    }
}
