//! Tool dispatch for one tool-use block.
//!
//! Order for a complete block: turn gates, browser cleanup, usage accounting,
//! routing, validation, repetition check, checkpoint, handler. Partial blocks
//! only reach handlers that opted in to progressive display.

use crate::logging;
use crate::tools::catalog::BROWSER_ACTION;
use crate::tools::describe::describe;
use crate::tools::family::{reconstruct, reconstruct_with_args};
use crate::tools::registry::Route;
use crate::tools::responses;
use crate::tools::spec::{ToolContext, ToolError, ToolHandler};

use super::block::ToolUse;
use super::callbacks::ToolCallbacks;
use super::engine::Engine;
use super::events::{AskKind, AskRequest, AskResponse, SayKind, SayMessage};
use super::turn::ResultContent;

pub(crate) async fn dispatch_tool(engine: &Engine, block: ToolUse) {
    let description = describe(&block);

    // === Turn gates ===
    let (rejected, already_used) = {
        let state = engine.lock_state();
        (state.turn.rejected_tool, state.turn.tool_already_used)
    };
    if rejected {
        let notice = if block.partial {
            responses::tool_interrupted(&description)
        } else {
            responses::tool_skipped(&description)
        };
        engine.push_notice(notice);
        return;
    }
    if already_used {
        engine.push_notice(responses::tool_already_used(&block.name));
        return;
    }

    let callbacks = ToolCallbacks::new(engine.clone(), &block.name, &description, block.partial);
    let route = engine.registry().resolve(&block.name);

    if block.partial {
        present_partial(engine, route, &block, &callbacks).await;
        return;
    }

    tracing::debug!(tool = %block.name, "dispatching tool");
    if block.name != BROWSER_ACTION {
        engine.host().close_browser().await;
    }
    let usage_name = engine.registry().usage_name(&block.name);
    engine.record_attempt(&usage_name);
    engine.host().capture_tool_usage(&usage_name);

    let Some(route) = route else {
        logging::warn(format!("Model called unknown tool {}", block.name));
        reject_input(engine, &usage_name, &callbacks, &responses::unknown_tool(&block.name));
        return;
    };

    // === Validation ===
    let (handler, invocation, mutating) = match route {
        Route::Tool(handler) => {
            let mode = engine.mode();
            if let Err(err) = engine.validator().validate(&block.name, &mode, &block.params) {
                reject_input(engine, &usage_name, &callbacks, &err.to_string());
                return;
            }
            let mutating = handler.mutates_workspace();
            (handler, block.clone(), mutating)
        }
        Route::Family { family, operation } => {
            let args = match block.json_arguments() {
                Ok(args) => args,
                Err(err) => {
                    let err = ToolError::invalid_json(err.to_string());
                    reject_input(engine, &usage_name, &callbacks, &err.to_string());
                    return;
                }
            };
            let outcome = family.validator().validate(&operation, &args);
            if !outcome.is_valid {
                let message = outcome.message.unwrap_or_else(|| {
                    format!("Invalid {} operation '{operation}'.", family.name())
                });
                reject_input(engine, &usage_name, &callbacks, &message);
                return;
            }
            let rebuilt =
                reconstruct_with_args(&block, family.name(), outcome.transformed_args.as_ref());
            let mutating = family.mutates(&operation) || family.handler().mutates_workspace();
            (family.handler().clone(), rebuilt, mutating)
        }
    };

    // === Repetition ===
    let check = engine.lock_state().repetition.check(&block);
    if !check.allow_execution {
        if let Some(prompt) = check.ask_user {
            handle_repetition(engine, &prompt.tool_name, &prompt.message_detail).await;
        }
        let message = responses::repetition_limit_reached(&block.name);
        engine.record_failure(&usage_name);
        engine.host().record_tool_error(&block.name, &message);
        callbacks.push_result(responses::tool_error(&message));
        return;
    }

    // === Execution ===
    if mutating {
        engine.checkpoint_gate().await;
    }
    let cx = ToolContext::new(engine.clone());
    match handler.handle(&cx, &invocation, &callbacks).await {
        Ok(()) => {
            if !engine.rejected_tool() {
                engine.reset_mistakes();
            }
            if !callbacks.has_pushed() {
                logging::warn(format!("Tool {} finished without a result", block.name));
                callbacks.push_result(responses::no_result(&block.name));
            }
        }
        Err(err) if err.is_input_error() => {
            engine.record_failure(&usage_name);
            engine.record_mistake();
            engine.host().record_tool_error(&block.name, &err.to_string());
            if let ToolError::MissingParam { param } = &err {
                let notice = format!(
                    "Tried to use {} without value for required parameter '{param}'. Retrying...",
                    block.name
                );
                let say = engine.host().say(SayMessage::new(SayKind::Error, notice));
                if let Err(say_err) = say.await {
                    logging::warn(format!("Failed to display tool error: {say_err}"));
                }
                let message = responses::missing_param_error(param);
                callbacks.push_result(responses::tool_error(&message));
            } else {
                callbacks.push_result(responses::tool_error(&err.to_string()));
            }
        }
        Err(err) => {
            engine.record_failure(&usage_name);
            callbacks
                .handle_error(&format!("executing {}", block.name), &err)
                .await;
        }
    }
}

async fn present_partial(
    engine: &Engine,
    route: Option<Route>,
    block: &ToolUse,
    callbacks: &ToolCallbacks,
) {
    let (handler, invocation): (std::sync::Arc<dyn ToolHandler>, ToolUse) = match route {
        Some(Route::Tool(handler)) => (handler, block.clone()),
        Some(Route::Family { family, .. }) => {
            (family.handler().clone(), reconstruct(block, family.name()))
        }
        None => return,
    };
    if !handler.supports_partial() {
        return;
    }
    let cx = ToolContext::new(engine.clone());
    if let Err(err) = handler.handle(&cx, &invocation, callbacks).await {
        tracing::debug!(tool = %block.name, error = %err, "partial presentation failed");
    }
}

// Malformed input: count the mistake and tell the model, never run the tool.
fn reject_input(engine: &Engine, usage_name: &str, callbacks: &ToolCallbacks, message: &str) {
    let tool = callbacks.tool_name();
    tracing::info!(tool, "tool call rejected: {message}");
    engine.record_failure(usage_name);
    engine.record_mistake();
    engine.host().record_tool_error(tool, message);
    callbacks.push_result(responses::tool_error(message));
}

async fn handle_repetition(engine: &Engine, tool_name: &str, detail: &str) {
    logging::warn(format!("Repetition limit reached for {tool_name}"));
    let request = AskRequest::new(AskKind::MistakeLimitReached, Some(detail.to_string()));
    let reply = match engine.host().ask(request).await {
        Ok(reply) => reply,
        Err(err) => {
            logging::warn(format!("Repetition prompt failed: {err}"));
            return;
        }
    };
    if reply.response != AskResponse::MessageResponse {
        return;
    }
    let Some(feedback) = reply.feedback() else {
        return;
    };
    let mut content = vec![ResultContent::text(responses::repetition_feedback(feedback))];
    content.extend(
        reply
            .images
            .iter()
            .cloned()
            .map(|data| ResultContent::Image { data }),
    );
    engine.push_result_content(content);
    let echo = SayMessage::new(SayKind::UserFeedback, feedback).with_images(reply.images.clone());
    if let Err(err) = engine.host().say(echo).await {
        logging::warn(format!("Failed to display user feedback: {err}"));
    }
}
