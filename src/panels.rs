//! Info box and legend controls

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use serde::Deserialize;
use tracing::trace;

use crate::scale::{ColorScale, LegendEntry};
use crate::state::{StateReader, SubscriptionId};
use crate::types::FeatureProps;

pub const INFO_TITLE: &str = "US Population Density";
pub const HOVER_PROMPT: &str = "Hover over a state";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InfoContent {
    Prompt,
    Feature(FeatureProps),
}

impl InfoContent {
    fn from_state(state: Option<&FeatureProps>) -> Self {
        match state {
            Some(props) => InfoContent::Feature(props.clone()),
            None => InfoContent::Prompt,
        }
    }
}

impl fmt::Display for InfoContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InfoContent::Prompt => f.write_str(HOVER_PROMPT),
            InfoContent::Feature(p) => {
                write!(f, "{}: {} people / mi²", p.name, format_density(p.density))
            }
        }
    }
}

/// Prints a density the way a browser prints a number: exponent form below
/// 1e-6 and from 1e21 up, no sign on zero.
pub fn format_density(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if value.is_infinite() {
        let sign = if value < 0.0 { "-" } else { "" };
        return format!("{}Infinity", sign);
    }
    let abs = value.abs();
    if abs >= 1e21 || abs < 1e-6 {
        let exp = format!("{:e}", value);
        return match exp.split_once('e') {
            Some((mantissa, power)) if !power.starts_with('-') => format!("{}e+{}", mantissa, power),
            _ => exp,
        };
    }
    value.to_string()
}

/// Shows the hovered feature, re-rendered from the hover state
/// subscription. Never writes to the state.
pub struct InfoPanel {
    position: ControlPosition,
    content: Rc<RefCell<InfoContent>>,
    #[cfg(test)]
    renders: Rc<Cell<u64>>,
    source: StateReader<FeatureProps>,
    subscription: SubscriptionId,
}

impl InfoPanel {
    pub fn mount(source: StateReader<FeatureProps>) -> Self {
        let content = Rc::new(RefCell::new(InfoContent::from_state(source.get().as_ref())));
        let renders = Rc::new(Cell::new(1u64));

        let (c, r) = (content.clone(), renders.clone());
        let subscription = source.subscribe(move |state| {
            *c.borrow_mut() = InfoContent::from_state(state);
            r.set(r.get() + 1);
            trace!(renders = r.get(), "info panel re-rendered");
        });

        Self {
            position: ControlPosition::TopRight,
            content,
            #[cfg(test)]
            renders,
            source,
            subscription,
        }
    }

    pub fn at(mut self, position: ControlPosition) -> Self {
        self.position = position;
        self
    }

    pub fn title(&self) -> &'static str {
        INFO_TITLE
    }

    pub fn position(&self) -> ControlPosition {
        self.position
    }

    pub fn content(&self) -> InfoContent {
        self.content.borrow().clone()
    }

    pub fn text(&self) -> String {
        self.content.borrow().to_string()
    }

    #[cfg(test)]
    pub fn render_count(&self) -> u64 {
        self.renders.get()
    }
}

impl Drop for InfoPanel {
    fn drop(&mut self) {
        self.source.unsubscribe(self.subscription);
        trace!(remaining = self.source.subscriber_count(), "info panel unmounted");
    }
}

/// Static list of density buckets, built once.
pub struct LegendPanel {
    position: ControlPosition,
    entries: Vec<LegendEntry>,
}

impl LegendPanel {
    pub fn new(scale: &ColorScale) -> Self {
        Self {
            position: ControlPosition::BottomRight,
            entries: scale.legend(),
        }
    }

    pub fn at(mut self, position: ControlPosition) -> Self {
        self.position = position;
        self
    }

    pub fn position(&self) -> ControlPosition {
        self.position
    }

    pub fn entries(&self) -> &[LegendEntry] {
        &self.entries
    }
}
