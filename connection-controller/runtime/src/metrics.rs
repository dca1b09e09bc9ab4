use crate::core::{ConnectionType, Decision};
use hyper::http::StatusCode;
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

#[derive(Clone, Debug, Default)]
pub struct ApiMetrics {
    requests: Family<RequestLabels, Counter>,
    connections: Family<ConnectionLabels, Counter>,
    decisions: Family<DecisionLabels, Counter>,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
struct RequestLabels {
    route: &'static str,
    code: String,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
struct ConnectionLabels {
    connection_type: &'static str,
    outcome: &'static str,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
struct DecisionLabels {
    outcome: &'static str,
}

/// How a connection request ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConnectionOutcome {
    Created,
    Denied,
    NotFound,
    Failed,
}

// === impl ApiMetrics ===

impl ApiMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let requests = Family::<RequestLabels, Counter>::default();
        reg.register(
            "requests",
            "Total number of API requests by route and response code",
            requests.clone(),
        );

        let connections = Family::<ConnectionLabels, Counter>::default();
        reg.register(
            "connections",
            "Total number of workspace connection requests by type and outcome",
            connections.clone(),
        );

        let decisions = Family::<DecisionLabels, Counter>::default();
        reg.register(
            "decisions",
            "Total number of workspace permission decisions by outcome",
            decisions.clone(),
        );

        Self {
            requests,
            connections,
            decisions,
        }
    }

    pub(crate) fn request(&self, route: &'static str, code: StatusCode) {
        self.requests
            .get_or_create(&RequestLabels {
                route,
                code: code.as_u16().to_string(),
            })
            .inc();
    }

    pub(crate) fn connection(&self, ty: ConnectionType, outcome: ConnectionOutcome) {
        self.connections
            .get_or_create(&ConnectionLabels {
                connection_type: ty.as_str(),
                outcome: outcome.as_str(),
            })
            .inc();
    }

    pub(crate) fn decision(&self, decision: Decision) {
        self.decisions
            .get_or_create(&DecisionLabels {
                outcome: decision.as_str(),
            })
            .inc();
    }
}

// === impl ConnectionOutcome ===

impl ConnectionOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Denied => "denied",
            Self::NotFound => "not_found",
            Self::Failed => "failed",
        }
    }
}
