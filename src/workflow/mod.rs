pub mod composer;
pub mod decision_form;
pub mod query;
pub mod signature;
pub mod template_fields;
pub mod text;
pub mod view_model;

pub use composer::{Access, Action, ComposerError, ResponseComposer, SubmitOutcome, Viewer};
pub use decision_form::{DecisionForm, FormError, Requirement, RoleSelection, TransitionSelection};
pub use query::{TicketSnapshot, TransitionQueryService};
pub use signature::{Signature, SignatureError, SignatureSource};
pub use template_fields::{SystemPreset, TemplateField, TemplateFieldError, TemplateFieldKind};
pub use view_model::{FlowError, Notice, Phase, TransitionViewModel};
