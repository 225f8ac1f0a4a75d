//! Cross-module lookups the network-interface operations depend on.

use crate::api::ApiFuture;
use crate::connection::ConnectionParams;
use crate::types::{GroupId, SubnetId, VpcId};

/// VPC association reported for a set of subnets.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SubnetAssociation {
    /// Owning VPC, when the subnets belong to one.
    pub vpc_id: Option<VpcId>,
}

/// Maps subnets to their VPC.
pub trait SubnetResolver: Send + Sync {
    /// Returns the VPC the given subnets belong to.
    fn subnet_association<'a>(
        &'a self,
        subnet_ids: &'a [SubnetId],
        params: &'a ConnectionParams,
    ) -> ApiFuture<'a, SubnetAssociation>;
}

/// Maps security group names to identifiers within a VPC.
pub trait SecurityGroupResolver: Send + Sync {
    /// Returns the identifiers of `group_names` in `vpc_id`. An empty list
    /// means none resolved.
    fn group_ids<'a>(
        &'a self,
        group_names: &'a [String],
        vpc_id: &'a VpcId,
        params: &'a ConnectionParams,
    ) -> ApiFuture<'a, Vec<GroupId>>;
}
