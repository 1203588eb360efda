use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

/// The factory roles a user can talk to
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AgentId {
    #[default]
    Supervisory,
    Production,
    Inventory,
    Logistics,
    Maintenance,
    Quality,
}

impl AgentId {
    /// Parse an identifier, treating anything unknown as the supervisory agent
    pub fn from_str_lossy(id: &str) -> Self {
        AgentId::from_str(id.trim()).unwrap_or_else(|_| {
            tracing::debug!(agent = id, "unknown agent id, using supervisory");
            AgentId::Supervisory
        })
    }

    pub fn descriptor(&self) -> &'static AgentDescriptor {
        // The catalog lists every variant in declaration order
        &AGENTS[*self as usize]
    }

    pub fn name(&self) -> &'static str {
        self.descriptor().name
    }

    /// Instruction template sent as the system prompt for this agent
    pub fn system_prompt(&self) -> &'static str {
        match self {
            AgentId::Supervisory => "You are the Supervisory Agent coordinating all factory operations across production, inventory, logistics, maintenance and quality. Provide comprehensive system insights and point out when an issue needs several teams.",
            AgentId::Production => "You are the Production Agent in a smart factory. Provide concise insights about production status, line efficiency and scheduling.",
            AgentId::Inventory => "You are the Inventory Agent in a smart factory. Provide insights about inventory levels, reorder points and material availability.",
            AgentId::Logistics => "You are the Logistics Agent in a smart factory. Provide insights about shipping, deliveries and order tracking.",
            AgentId::Maintenance => "You are the Maintenance Agent in a smart factory. Provide insights about equipment health, predictive maintenance and repairs.",
            AgentId::Quality => "You are the Quality Control Agent in a smart factory. Provide insights about product quality, defect rates and inspections.",
        }
    }
}

/// Static catalog entry describing one agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentDescriptor {
    pub id: AgentId,
    pub name: &'static str,
    pub description: &'static str,
}

pub static AGENTS: [AgentDescriptor; 6] = [
    AgentDescriptor {
        id: AgentId::Supervisory,
        name: "Supervisory Agent",
        description: "Overall system coordination",
    },
    AgentDescriptor {
        id: AgentId::Production,
        name: "Production Agent",
        description: "Production line management",
    },
    AgentDescriptor {
        id: AgentId::Inventory,
        name: "Inventory Agent",
        description: "Stock and materials tracking",
    },
    AgentDescriptor {
        id: AgentId::Logistics,
        name: "Logistics Agent",
        description: "Shipping and receiving",
    },
    AgentDescriptor {
        id: AgentId::Maintenance,
        name: "Maintenance Agent",
        description: "Equipment maintenance",
    },
    AgentDescriptor {
        id: AgentId::Quality,
        name: "Quality Control Agent",
        description: "Product quality assurance",
    },
];

/// Agent identifier together with the prompt it is answered with
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentContext {
    pub agent_id: AgentId,
    pub system_prompt: &'static str,
}

pub fn get_agent_context(agent: AgentId) -> AgentContext {
    AgentContext {
        agent_id: agent,
        system_prompt: agent.system_prompt(),
    }
}

pub fn catalog() -> impl Iterator<Item = &'static AgentDescriptor> {
    AgentId::iter().map(|id| id.descriptor())
}
