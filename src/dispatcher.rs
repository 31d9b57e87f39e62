//! Turn-level orchestration: one request in, one complete response out.
//!
//! Routing is an explicit ordered table of named (predicate, route) rules
//! evaluated top-down; the first predicate that matches wins. This keeps the
//! priority contract visible and testable per rule instead of buried in
//! control flow. The dispatcher is request-scoped and stateless between
//! invocations — the only cross-turn state is the pending-confirmation value
//! the caller echoes back.
//!
//! Hard invariant: every branch returns the complete forest, piped through
//! `tree::assign_stable_ids`, and no branch partially writes it.

use std::sync::Arc;

use crate::classifier::{self, Intent, IntentResult};
use crate::config::DispatcherConfig;
use crate::confirm;
use crate::extraction;
use crate::matcher::{find_matches, MatchOutcome};
use crate::provider::{CompletionProvider, SessionStore};
use crate::rollover;
use crate::tree;
use crate::types::{
    MatchCandidate, PendingAction, PendingConfirmation, SessionSnapshot, Task, TaskLevels,
    TurnRequest, TurnResponse,
};

/// The routing branches, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// A pending destructive action from the previous turn is resolved first.
    ResolvePendingDelete,
    /// Transcript present and this is the opening turn: full meeting analysis.
    MeetingAnalysis,
    /// Explicit transcript/summary/attendee cues: answer, don't touch tasks.
    KnowledgeCue,
    /// Classifier says the user wants an answer.
    RoutedKnowledge,
    /// Classifier can't tell; ask the clarifying question.
    Clarify,
    /// Mutation verbs that need one specific task resolved first.
    TargetedMutation,
    /// Delete family: two-step confirm-before-destroy.
    Delete,
    /// Selected tasks or a named context task: break down / refine.
    Refinement,
    /// Transcript exists but this is a follow-up turn.
    TranscriptFollowUp,
    /// Everything else: general message extraction.
    GeneralExtraction,
}

/// The request features the routing predicates look at. `intent` is None
/// until the classifier has been consulted (the first two rules never need
/// it, and skipping the call keeps the opening turn to one provider round
/// trip).
#[derive(Debug, Clone, Copy)]
pub struct RouteContext<'a> {
    pub message: &'a str,
    pub transcript: Option<&'a str>,
    pub has_tasks: bool,
    pub has_selection: bool,
    pub is_first_message: bool,
    pub pending_delete: bool,
    pub intent: Option<Intent>,
}

impl<'a> RouteContext<'a> {
    pub fn from_request(request: &'a TurnRequest, intent: Option<Intent>) -> Self {
        RouteContext {
            message: &request.message,
            transcript: request.source_meeting_transcript.as_deref(),
            has_tasks: !request.existing_tasks.is_empty(),
            has_selection: !request.selected_tasks.is_empty()
                || request.context_task_title.is_some(),
            is_first_message: request.is_first_message,
            pending_delete: request.pending_confirmation.is_some(),
            intent,
        }
    }
}

type Predicate = fn(&RouteContext) -> bool;

/// The priority-ordered routing table. First hit wins; no hit falls through
/// to `Route::GeneralExtraction`.
pub const RULES: &[(&str, Predicate, Route)] = &[
    ("resolve-pending-delete", pending_delete, Route::ResolvePendingDelete),
    ("initial-meeting-analysis", initial_meeting_analysis, Route::MeetingAnalysis),
    ("knowledge-cue", knowledge_cue, Route::KnowledgeCue),
    ("routed-knowledge", routed_knowledge, Route::RoutedKnowledge),
    ("routed-ambiguous", routed_ambiguous, Route::Clarify),
    ("targeted-mutation", targeted_mutation, Route::TargetedMutation),
    ("delete-intent", delete_intent, Route::Delete),
    ("refinement", refinement, Route::Refinement),
    ("transcript-follow-up", transcript_follow_up, Route::TranscriptFollowUp),
];

fn pending_delete(ctx: &RouteContext) -> bool {
    ctx.pending_delete
}

fn initial_meeting_analysis(ctx: &RouteContext) -> bool {
    ctx.transcript
        .is_some_and(|t| ctx.is_first_message || ctx.message.trim() == t.trim())
}

fn knowledge_cue(ctx: &RouteContext) -> bool {
    ctx.transcript.is_some() && !ctx.has_selection && classifier::is_knowledge_cue(ctx.message)
}

fn routed_knowledge(ctx: &RouteContext) -> bool {
    ctx.intent == Some(Intent::Knowledge)
}

fn routed_ambiguous(ctx: &RouteContext) -> bool {
    ctx.intent == Some(Intent::Ambiguous)
}

fn targeted_mutation(ctx: &RouteContext) -> bool {
    ctx.has_tasks && !ctx.has_selection && classifier::is_mutation_request(ctx.message)
}

fn delete_intent(ctx: &RouteContext) -> bool {
    ctx.has_tasks && classifier::is_delete_request(ctx.message)
}

fn refinement(ctx: &RouteContext) -> bool {
    ctx.has_selection
}

fn transcript_follow_up(ctx: &RouteContext) -> bool {
    ctx.transcript.is_some()
}

/// Evaluate the rule table top-down.
pub fn select_route(ctx: &RouteContext) -> Route {
    for (name, predicate, route) in RULES {
        if predicate(ctx) {
            log::debug!("route rule '{}' matched", name);
            return *route;
        }
    }
    Route::GeneralExtraction
}

/// The orchestrator. Holds the two external seams; everything else arrives
/// with the request.
pub struct Dispatcher {
    provider: Arc<dyn CompletionProvider>,
    sessions: Arc<dyn SessionStore>,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(provider: Arc<dyn CompletionProvider>, sessions: Arc<dyn SessionStore>) -> Self {
        Dispatcher::with_config(provider, sessions, DispatcherConfig::default())
    }

    pub fn with_config(
        provider: Arc<dyn CompletionProvider>,
        sessions: Arc<dyn SessionStore>,
        config: DispatcherConfig,
    ) -> Self {
        Dispatcher {
            provider,
            sessions,
            config,
        }
    }

    /// Handle one conversational turn. Never fails: every provider or lookup
    /// failure degrades to a valid response with the forest intact.
    pub async fn handle_turn(&self, request: &TurnRequest) -> TurnResponse {
        // First pass without the classifier; only consult it when none of
        // the intent-free rules fired.
        let ctx = RouteContext::from_request(request, None);
        let mut route = select_route(&ctx);
        let mut intent: Option<IntentResult> = None;

        if !matches!(
            route,
            Route::ResolvePendingDelete | Route::MeetingAnalysis | Route::KnowledgeCue
        ) {
            let result = classifier::classify(
                self.provider.as_ref(),
                &request.message,
                ctx.transcript.is_some(),
                ctx.has_tasks,
            )
            .await;
            let ctx = RouteContext::from_request(request, Some(result.intent));
            route = select_route(&ctx);
            intent = Some(result);
        }

        log::debug!("dispatching turn via {:?}", route);
        let response = match route {
            Route::ResolvePendingDelete => self.resolve_pending_delete(request),
            Route::MeetingAnalysis => self.run_meeting_analysis(request).await,
            Route::KnowledgeCue | Route::RoutedKnowledge => self.run_knowledge(request).await,
            Route::Clarify => self.run_clarify(request, intent),
            Route::TargetedMutation => self.run_targeted_mutation(request).await,
            Route::Delete => self.run_delete(request),
            Route::Refinement => self.run_refinement(request).await,
            Route::TranscriptFollowUp => self.run_transcript_follow_up(request).await,
            Route::GeneralExtraction => self.run_general_extraction(request).await,
        };

        finalize(response)
    }

    // -----------------------------------------------------------------------
    // Branch handlers
    // -----------------------------------------------------------------------

    fn resolve_pending_delete(&self, request: &TurnRequest) -> TurnResponse {
        // Predicate guarantees presence
        let Some(pending) = request.pending_confirmation.clone() else {
            return text_response(
                "Nothing is awaiting confirmation.".to_string(),
                request.existing_tasks.clone(),
            );
        };
        if confirm::message_confirms(&request.message, &pending) {
            let (tasks, removed) = tree::remove_task(request.existing_tasks.clone(), &pending.task_id);
            if removed {
                return text_response(format!("Deleted \"{}\".", pending.task_title), tasks);
            }
            log::warn!("pending delete target {} no longer in forest", pending.task_id);
            return text_response(
                format!(
                    "I couldn't find \"{}\" anymore, so nothing was deleted.",
                    pending.task_title
                ),
                request.existing_tasks.clone(),
            );
        }
        text_response(
            format!("Okay, I'll keep \"{}\".", pending.task_title),
            request.existing_tasks.clone(),
        )
    }

    async fn run_meeting_analysis(&self, request: &TurnRequest) -> TurnResponse {
        let transcript = request
            .source_meeting_transcript
            .as_deref()
            .unwrap_or(&request.message);
        let level = request
            .requested_detail_level
            .unwrap_or(self.config.default_detail_level);
        let analysis =
            extraction::analyze_meeting(self.provider.as_ref(), transcript, level).await;

        let prior = self.fetch_prior_session(request).await;
        let prior_tasks = prior.as_ref().map(|s| s.tasks.as_slice()).unwrap_or(&[]);

        let levels = TaskLevels {
            light: self.reconcile_level(analysis.levels.light, prior_tasks, request),
            medium: self.reconcile_level(analysis.levels.medium, prior_tasks, request),
            detailed: self.reconcile_level(analysis.levels.detailed, prior_tasks, request),
        };
        let tasks = levels.level(level).clone();

        TurnResponse {
            chat_response_text: analysis.reply,
            tasks,
            session_title: analysis.session_title,
            all_task_levels: Some(levels),
            people: analysis.people,
            qa_answer: None,
            pending_confirmation: None,
        }
    }

    /// Prior-session ids first, then the current forest — so when a task
    /// matches both, the current session's identity wins.
    fn reconcile_level(
        &self,
        tasks: Vec<Task>,
        prior_tasks: &[Task],
        request: &TurnRequest,
    ) -> Vec<Task> {
        let tasks = if prior_tasks.is_empty() {
            tasks
        } else {
            rollover::reconcile_ids(tasks, prior_tasks)
        };
        rollover::carry_forward(tasks, &request.existing_tasks)
    }

    async fn fetch_prior_session(&self, request: &TurnRequest) -> Option<SessionSnapshot> {
        let id = request.previous_meeting_id.as_deref()?;
        match self.sessions.fetch_session(id).await {
            Ok(Some(snapshot)) => Some(snapshot),
            Ok(None) => {
                log::warn!("previous meeting {} not found; continuing without it", id);
                None
            }
            Err(e) => {
                log::warn!("session lookup for {} failed: {}; continuing without it", id, e);
                None
            }
        }
    }

    async fn run_knowledge(&self, request: &TurnRequest) -> TurnResponse {
        match request.source_meeting_transcript.as_deref() {
            Some(transcript) => {
                let answer = extraction::answer_from_transcript(
                    self.provider.as_ref(),
                    &request.message,
                    transcript,
                )
                .await;
                TurnResponse {
                    chat_response_text: answer.clone(),
                    tasks: request.existing_tasks.clone(),
                    qa_answer: Some(answer),
                    ..Default::default()
                }
            }
            None => text_response(
                "I don't have a meeting transcript to reference for that.".to_string(),
                request.existing_tasks.clone(),
            ),
        }
    }

    fn run_clarify(&self, request: &TurnRequest, intent: Option<IntentResult>) -> TurnResponse {
        let question = intent
            .and_then(|r| r.clarifying_question)
            .unwrap_or_else(|| {
                "Could you say a bit more about what you'd like me to do?".to_string()
            });
        text_response(question, request.existing_tasks.clone())
    }

    async fn run_targeted_mutation(&self, request: &TurnRequest) -> TurnResponse {
        let report = find_matches(&request.message, &request.existing_tasks);
        match report.resolve(self.config.tie_band, self.config.max_tie_candidates) {
            MatchOutcome::NoTokens => text_response(
                "Which task do you mean? Give me a few words from its title.".to_string(),
                request.existing_tasks.clone(),
            ),
            MatchOutcome::NoMatch => text_response(
                "I couldn't find a task matching that, so nothing was changed. Which task did you mean?"
                    .to_string(),
                request.existing_tasks.clone(),
            ),
            MatchOutcome::Tie(candidates) => text_response(
                ambiguity_prompt(&candidates),
                request.existing_tasks.clone(),
            ),
            MatchOutcome::Unique(candidate) => {
                let result = extraction::extract_from_message(
                    self.provider.as_ref(),
                    &request.message,
                    &request.existing_tasks,
                    Some(&candidate.task),
                )
                .await;
                text_response(
                    result.reply,
                    rollover::carry_forward(result.tasks, &request.existing_tasks),
                )
            }
        }
    }

    fn run_delete(&self, request: &TurnRequest) -> TurnResponse {
        let report = find_matches(&request.message, &request.existing_tasks);
        match report.resolve(self.config.tie_band, self.config.max_tie_candidates) {
            MatchOutcome::NoTokens => text_response(
                "Which task should I delete? Give me a few words from its title.".to_string(),
                request.existing_tasks.clone(),
            ),
            MatchOutcome::NoMatch => text_response(
                "I couldn't find a task matching that, so nothing was deleted.".to_string(),
                request.existing_tasks.clone(),
            ),
            MatchOutcome::Tie(candidates) => text_response(
                ambiguity_prompt(&candidates),
                request.existing_tasks.clone(),
            ),
            MatchOutcome::Unique(candidate) => {
                // One-shot path: the message already is the confirmation phrase
                if let Some(title) = confirm::explicit_delete_confirmation(&request.message) {
                    if rollover::titles_correspond(&title, &candidate.task.title) {
                        let (tasks, removed) =
                            tree::remove_task(request.existing_tasks.clone(), &candidate.task.id);
                        if removed {
                            return text_response(
                                format!("Deleted \"{}\".", candidate.task.title),
                                tasks,
                            );
                        }
                    }
                }
                TurnResponse {
                    chat_response_text: confirm::confirmation_prompt(&candidate.task),
                    tasks: request.existing_tasks.clone(),
                    pending_confirmation: Some(PendingConfirmation {
                        task_id: candidate.task.id.clone(),
                        task_title: candidate.task.title.clone(),
                        action: PendingAction::Delete,
                    }),
                    ..Default::default()
                }
            }
        }
    }

    async fn run_refinement(&self, request: &TurnRequest) -> TurnResponse {
        let result = extraction::refine_tasks(
            self.provider.as_ref(),
            &request.message,
            &request.existing_tasks,
            &request.selected_tasks,
            request.context_task_title.as_deref(),
        )
        .await;
        // Refinement returns the complete forest; on failure the routine
        // already degraded to the input, so no carry-forward here.
        text_response(result.reply, result.tasks)
    }

    async fn run_transcript_follow_up(&self, request: &TurnRequest) -> TurnResponse {
        let has_tasks = !request.existing_tasks.is_empty();
        if classifier::is_action_phrased(&request.message) && has_tasks {
            let result = extraction::extract_from_message(
                self.provider.as_ref(),
                &request.message,
                &request.existing_tasks,
                None,
            )
            .await;
            text_response(
                result.reply,
                rollover::carry_forward(result.tasks, &request.existing_tasks),
            )
        } else {
            self.run_knowledge(request).await
        }
    }

    async fn run_general_extraction(&self, request: &TurnRequest) -> TurnResponse {
        let result = extraction::extract_from_message(
            self.provider.as_ref(),
            &request.message,
            &request.existing_tasks,
            None,
        )
        .await;
        text_response(
            result.reply,
            rollover::carry_forward(result.tasks, &request.existing_tasks),
        )
    }
}

/// List up to the configured number of tied titles and ask which one.
fn ambiguity_prompt(candidates: &[MatchCandidate]) -> String {
    let titles: Vec<String> = candidates
        .iter()
        .map(|c| format!("\"{}\"", c.task.title))
        .collect();
    format!(
        "I found a few tasks that could match: {}. Which one did you mean?",
        titles.join(", ")
    )
}

fn text_response(text: String, tasks: Vec<Task>) -> TurnResponse {
    TurnResponse {
        chat_response_text: text,
        tasks,
        ..Default::default()
    }
}

/// Public invariant: every returned task has a valid identifier.
fn finalize(mut response: TurnResponse) -> TurnResponse {
    response.tasks = tree::assign_stable_ids(response.tasks);
    if let Some(levels) = response.all_task_levels.take() {
        response.all_task_levels = Some(TaskLevels {
            light: tree::assign_stable_ids(levels.light),
            medium: tree::assign_stable_ids(levels.medium),
            detailed: tree::assign_stable_ids(levels.detailed),
        });
    }
    response
}
