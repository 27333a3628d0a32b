use std::sync::Arc;

use warpnet_core::{ConfigSource, Gid, Lp, Mapping, SimTime};

use crate::{
    Fabric, NetId, Payload, Request, SetupError, SimEvent, SimulationError, WrappedMessage,
    sched::SchedulerKind, torus::TorusFabric,
};

// CONSTANTS
// ================================================================================================

/// Name the base magic is derived from.
const MN_NAME: &str = "model_net_base";

/// Packet size used when the configuration does not specify one.
const PACKET_SIZE_DEFAULT: u64 = 512;

/// Packet size forced by the fcfs-full scheduler: larger than any realistic request, with room
/// to spare for arithmetic on top of it.
const PACKET_SIZE_UNBOUNDED: u64 = 1 << 62;

// BASE PARAMETERS
// ================================================================================================

/// The annotation-selected parameter block of a base LP.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BaseParams {
    /// Scheduler discipline for outstanding requests.
    pub scheduler: SchedulerKind,
    /// Packet size stamped into every request, in bytes.
    pub packet_size: u64,
}

// MODEL-NET ENGINE
// ================================================================================================

/// The configured model-net engine: base magic, annotation-keyed base parameters, the mapping
/// service handle and the fabric method registry.
///
/// Built once by [`ModelNet::configure`] and immutable afterwards; shared across every LP.
pub struct ModelNet {
    magic: u32,
    mapping: Arc<dyn Mapping + Send + Sync>,
    params: Vec<(Option<String>, BaseParams)>,
    fabrics: Vec<Arc<dyn Fabric>>,
}

impl ModelNet {
    // CONSTRUCTOR
    // --------------------------------------------------------------------------------------------

    /// Reads the base parameters for every `modelnet_*` annotation and builds the requested
    /// fabrics.
    ///
    /// # Errors
    /// Returns an error on an unknown scheduler name, a malformed or missing fabric parameter,
    /// or a request for a fabric this build cannot construct.
    pub fn configure(
        config: &dyn ConfigSource,
        mapping: Arc<dyn Mapping + Send + Sync>,
        nets: &[NetId],
    ) -> Result<Self, SetupError> {
        let magic = base_magic();

        let mut params = Vec::new();
        for annotation in config.lp_annotations("modelnet_") {
            let block = read_base_params(config, annotation.as_deref())?;
            params.push((annotation, block));
        }

        let mut fabrics: Vec<Arc<dyn Fabric>> = Vec::new();
        for net in nets {
            match net {
                NetId::Torus => {
                    fabrics.push(Arc::new(TorusFabric::configure(config, magic)?));
                },
                other => {
                    return Err(SetupError::UnsupportedFabric { fabric: other.method_name() });
                },
            }
        }

        Ok(Self { magic, mapping, params, fabrics })
    }

    // PUBLIC ACCESSORS
    // --------------------------------------------------------------------------------------------

    /// Returns the process-wide base magic.
    #[inline(always)]
    pub fn magic(&self) -> u32 {
        self.magic
    }

    /// Returns the mapping service handle.
    pub fn mapping(&self) -> &dyn Mapping {
        self.mapping.as_ref()
    }

    /// Returns the parameter block selected by the given annotation.
    pub fn params_for(&self, annotation: Option<&str>) -> Option<&BaseParams> {
        self.params
            .iter()
            .find(|(anno, _)| anno.as_deref() == annotation)
            .map(|(_, block)| block)
    }

    /// Returns the configured fabric with the given id.
    pub fn fabric(&self, net_id: NetId) -> Result<&Arc<dyn Fabric>, SimulationError> {
        self.fabrics
            .iter()
            .find(|fabric| fabric.net_id() == net_id)
            .ok_or(SimulationError::FabricNotConfigured { fabric: net_id.method_name() })
    }

    /// Returns the fabric registering the given LP type name, together with its id.
    pub fn fabric_for_lp_type(&self, type_name: &str) -> Option<(NetId, &Arc<dyn Fabric>)> {
        self.fabrics
            .iter()
            .find(|fabric| fabric.lp_type_names().contains(&type_name))
            .map(|fabric| (fabric.net_id(), fabric))
    }

    /// Returns every LP type name the configured fabrics register.
    pub fn lp_type_names(&self) -> Vec<&'static str> {
        self.fabrics.iter().flat_map(|fabric| fabric.lp_type_names().iter().copied()).collect()
    }

    // WORKLOAD-FACING EVENT CONSTRUCTORS
    // --------------------------------------------------------------------------------------------

    /// Issues a message of `message_size` bytes from the calling workload LP to `final_dest_gid`.
    ///
    /// A NEW_MSG wrapped event is scheduled on the model-net LP co-located with the sender at
    /// `offset + local_latency()`. The remote payload is delivered at the destination once the
    /// message fully arrives; the local payload is delivered back at the sender once the message
    /// has fully left the source NIC.
    pub fn event(
        &self,
        net_id: NetId,
        category: &str,
        final_dest_gid: Gid,
        message_size: u64,
        offset: SimTime,
        remote: &[u8],
        local: &[u8],
        lp: &mut dyn Lp<Event = SimEvent>,
    ) -> Result<(), SimulationError> {
        self.event_impl(
            net_id,
            category,
            final_dest_gid,
            message_size,
            false,
            0,
            offset,
            remote,
            local,
            lp,
        )
    }

    /// Issues a pull request: a `request_size`-byte message that causes `final_dest_gid`'s node
    /// to answer with a `pull_size`-byte message carrying the remote payload back to the sender.
    pub fn pull_event(
        &self,
        net_id: NetId,
        category: &str,
        final_dest_gid: Gid,
        request_size: u64,
        pull_size: u64,
        offset: SimTime,
        remote: &[u8],
        lp: &mut dyn Lp<Event = SimEvent>,
    ) -> Result<(), SimulationError> {
        self.event_impl(
            net_id,
            category,
            final_dest_gid,
            request_size,
            true,
            pull_size,
            offset,
            remote,
            &[],
            lp,
        )
    }

    /// Reverses one [`ModelNet::event`] or [`ModelNet::pull_event`] call.
    pub fn event_rc(&self, lp: &mut dyn Lp<Event = SimEvent>) {
        lp.local_latency_reverse();
    }

    #[allow(clippy::too_many_arguments)]
    fn event_impl(
        &self,
        net_id: NetId,
        category: &str,
        final_dest_gid: Gid,
        message_size: u64,
        is_pull: bool,
        pull_size: u64,
        offset: SimTime,
        remote: &[u8],
        local: &[u8],
        lp: &mut dyn Lp<Event = SimEvent>,
    ) -> Result<(), SimulationError> {
        let fabric = self.fabric(net_id)?;
        let src_mn_lp = fabric.find_local_device(self.mapping(), lp.gid())?;
        let dest_mn_lp = fabric.find_local_device(self.mapping(), final_dest_gid)?;

        let req = Request {
            dest_mn_lp,
            final_dest_gid,
            sender_gid: lp.gid(),
            category: Arc::from(category),
            msg_size: message_size,
            // the base LP owns the packet size and stamps it on delivery
            packet_size: 0,
            is_pull,
            pull_size,
            remote_event_size: remote.len(),
            self_event_size: local.len(),
        };
        let msg = WrappedMessage::new_msg(self.magic, req, Payload::new(remote, local));
        let offset = offset + lp.local_latency();
        lp.send(src_mn_lp, offset, SimEvent::ModelNet(msg));
        Ok(())
    }

    // REPORTING
    // --------------------------------------------------------------------------------------------

    /// Emits every configured fabric's end-of-run statistics reduction.
    pub fn report_stats(&self) {
        for fabric in &self.fabrics {
            fabric.report_stats();
        }
    }
}

// HELPERS
// ================================================================================================

/// Returns the process-wide base magic, derived from the base LP name.
fn base_magic() -> u32 {
    let hash = blake3::hash(MN_NAME.as_bytes());
    let bytes = hash.as_bytes();
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Reads one annotation's base parameter block.
fn read_base_params(
    config: &dyn ConfigSource,
    annotation: Option<&str>,
) -> Result<BaseParams, SetupError> {
    let scheduler = match config.get_str("PARAMS", "modelnet_scheduler", annotation) {
        Some(name) => {
            SchedulerKind::from_name(&name).ok_or(SetupError::UnknownScheduler { name })?
        },
        None => SchedulerKind::Fcfs,
    };

    let mut packet_size = config.get_u64("PARAMS", "packet_size", annotation)?.unwrap_or(0);
    if scheduler == SchedulerKind::FcfsFull {
        packet_size = PACKET_SIZE_UNBOUNDED;
    } else if packet_size == 0 {
        packet_size = PACKET_SIZE_DEFAULT;
        tracing::warn!(packet_size, "no packet size specified, using the default");
    }

    Ok(BaseParams { scheduler, packet_size })
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use super::{BaseParams, base_magic, read_base_params};
    use crate::sched::SchedulerKind;
    use warpnet_test_utils::TestConfig;

    #[test]
    fn magic_is_stable() {
        assert_eq!(base_magic(), base_magic());
        assert_ne!(base_magic(), 0);
    }

    #[test]
    fn defaults_apply() {
        let cfg = TestConfig::new();
        let params = read_base_params(&cfg, None).unwrap();
        assert_eq!(params, BaseParams { scheduler: SchedulerKind::Fcfs, packet_size: 512 });
    }

    #[test]
    fn fcfs_full_forces_packet_size() {
        let cfg = TestConfig::new()
            .with("PARAMS", "modelnet_scheduler", "fcfs-full")
            .with("PARAMS", "packet_size", "512");
        let params = read_base_params(&cfg, None).unwrap();
        assert_eq!(params.scheduler, SchedulerKind::FcfsFull);
        assert_eq!(params.packet_size, 1 << 62);
    }

    #[test]
    fn unknown_scheduler_is_fatal() {
        let cfg = TestConfig::new().with("PARAMS", "modelnet_scheduler", "round-robin");
        assert!(read_base_params(&cfg, None).is_err());
    }

    #[test]
    fn annotated_blocks_are_separate() {
        let cfg = TestConfig::new()
            .with("PARAMS", "packet_size", "512")
            .with_annotated("PARAMS", "packet_size", Some("fast"), "64");
        assert_eq!(read_base_params(&cfg, None).unwrap().packet_size, 512);
        assert_eq!(read_base_params(&cfg, Some("fast")).unwrap().packet_size, 64);
    }
}
