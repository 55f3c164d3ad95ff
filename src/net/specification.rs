use std::{collections::HashMap, sync::Arc};

use tracing::debug;

use crate::{
    CaseflowError, Result, VerificationError,
    model::SpecificationModel,
    net::{net::Net, verify::verify},
};

/// A verified specification: the root net plus every decomposition it may
/// delegate to.
///
/// Construction runs verification, so holding a `Specification` means every
/// net in it passed.
#[derive(Debug, Clone)]
pub struct Specification {
    id: String,
    name: String,
    env: HashMap<String, String>,
    root: Arc<Net>,
    nets: HashMap<String, Arc<Net>>,
}

impl Specification {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    pub fn root(&self) -> &Arc<Net> {
        &self.root
    }

    pub fn net(
        &self,
        id: &str,
    ) -> Option<&Arc<Net>> {
        self.nets.get(id)
    }

    pub fn nets(&self) -> impl Iterator<Item = &Arc<Net>> {
        self.nets.values()
    }
}

impl TryFrom<&SpecificationModel> for Specification {
    type Error = CaseflowError;

    fn try_from(model: &SpecificationModel) -> Result<Self> {
        let mut errors = Vec::new();
        let mut nets = HashMap::new();

        for net_model in model.nets.iter() {
            if nets.contains_key(&net_model.id) {
                errors.push(VerificationError::DuplicateNet {
                    net: net_model.id.clone(),
                });
                continue;
            }
            match Net::build(net_model) {
                Ok(net) => {
                    errors.extend(verify(&net));
                    nets.insert(net_model.id.clone(), Arc::new(net));
                }
                Err(e) => errors.extend(e),
            }
        }

        let root = nets.get(&model.root).cloned();
        if root.is_none() && !model.nets.iter().any(|n| n.id == model.root) {
            errors.push(VerificationError::MissingRootNet {
                root: model.root.clone(),
            });
        }

        match root {
            Some(root) if errors.is_empty() => {
                debug!(spec = %model.id, nets = nets.len(), "specification verified");
                Ok(Self {
                    id: model.id.clone(),
                    name: model.name.clone(),
                    env: model.env.clone(),
                    root,
                    nets,
                })
            }
            _ => Err(CaseflowError::Verification(errors)),
        }
    }
}
