use crate::{
    errors::Error,
    messaging::types::{KeyboardButton, KeyboardLayout},
    params::{CallbackParams, ParameterBag},
    route::{self, Action, TokenRequirement},
    tokens::{Token, TokenStore},
    Result,
};

/// A button before its parameters have been exchanged for a token.
#[derive(Clone, Debug, PartialEq)]
pub struct Button {
    pub label: String,
    pub action: Action,
    pub params: Option<CallbackParams>,
}

impl Button {
    pub fn to(label: impl Into<String>, action: Action) -> Self {
        Self {
            label: label.into(),
            action,
            params: None,
        }
    }

    pub fn with(label: impl Into<String>, action: Action, params: CallbackParams) -> Self {
        Self {
            label: label.into(),
            action,
            params: Some(params),
        }
    }
}

/// One rendered menu: message text plus unminted keyboard rows.
#[derive(Clone, Debug, PartialEq)]
pub struct Screen {
    pub text: String,
    pub rows: Vec<Vec<Button>>,
}

/// Text and keyboard ready to hand to the transport.
#[derive(Clone, Debug, PartialEq)]
pub struct MenuReply {
    pub text: String,
    pub keyboard: KeyboardLayout,
}

/// Mint tokens for every parameterised button and render the routes.
///
/// Identical bags within one screen share a token; nothing is reused across calls. Any
/// failure aborts the whole screen so no button is emitted with an unstored token.
pub async fn materialize(tokens: &dyn TokenStore, screen: Screen) -> Result<MenuReply> {
    let mut minted: Vec<(ParameterBag, Token)> = Vec::new();
    let mut rows = Vec::with_capacity(screen.rows.len());

    for row in screen.rows {
        let mut out = Vec::with_capacity(row.len());
        for button in row {
            let token = match (&button.params, button.action.token_requirement()) {
                (Some(params), TokenRequirement::Required) => {
                    let bag = params.to_bag();
                    match minted.iter().find(|(b, _)| *b == bag) {
                        Some((_, t)) => Some(t.clone()),
                        None => {
                            let t = tokens.put(&bag).await?;
                            minted.push((bag, t.clone()));
                            Some(t)
                        }
                    }
                }
                (None, TokenRequirement::None) => None,
                (params, _) => {
                    return Err(Error::Encoding(format!(
                        "button {:?} for {} has mismatched parameters {params:?}",
                        button.label,
                        button.action.as_str()
                    )))
                }
            };
            out.push(KeyboardButton {
                label: button.label,
                callback_data: route::render(button.action, token.as_ref())?,
            });
        }
        rows.push(out);
    }

    Ok(MenuReply {
        text: screen.text,
        keyboard: KeyboardLayout { rows },
    })
}
