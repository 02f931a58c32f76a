//! The primary core's side of a run: initialize the shared region, start
//! the secondaries, then walk a plan of message exchanges and report
//! which cores answered.
//!
//! A plan is data.  Each [`Step`] sends one kind of message to every
//! online secondary and collects one `Ack` per core; a core that does not
//! answer within the [`RetryBudget`] fails the step without stopping the
//! run.

use khal::psci::Firmware;

use crate::arch::smp::{self, Core, CoreId, CoreMask, MAX_CORES};
use crate::error::{BringUpError, IpcError};
use crate::ipc::mailbox::MessageKind;
use crate::kprintln;
use crate::service::{ack_payload, Role};

/// Ping payload is `PING_BASE + dest`.
pub const PING_BASE: u32 = 0x1000;
/// Data payload is `DATA_BASE + dest * DATA_STRIDE`.
pub const DATA_BASE: u32 = 0xDEAD_0000;
pub const DATA_STRIDE: u32 = 0x100;

/// Longest plan a [`Report`] can record.
pub const MAX_STEPS: usize = 8;

/// One exchange with every online secondary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
	/// `Ping` each core; expect an ack of the ping payload.
	PingAll,
	/// `Data` each core; expect an ack of the data payload.
	SendData,
	/// `Shutdown` each core, one at a time: producers, then responders,
	/// then consumers, so queued keystrokes are forwarded before anyone
	/// stops draining them.
	Shutdown,
}

/// Ping, data, then stop every core.
pub const DEFAULT_PLAN: &[Step] = &[Step::PingAll, Step::SendData, Step::Shutdown];

/// Ping and data only; producer and consumer keep echoing keystrokes.
pub const INTERACTIVE_PLAN: &[Step] = &[Step::PingAll, Step::SendData];

impl Step {
	pub fn kind(self) -> MessageKind {
		match self {
			Step::PingAll => MessageKind::Ping,
			Step::SendData => MessageKind::Data,
			Step::Shutdown => MessageKind::Shutdown,
		}
	}

	pub fn payload(self, dest: CoreId) -> u32 {
		let dest = u32::from(dest.raw());
		match self {
			Step::PingAll => PING_BASE + dest,
			Step::SendData => DATA_BASE + dest * DATA_STRIDE,
			Step::Shutdown => 0,
		}
	}

	pub fn name(self) -> &'static str {
		match self {
			Step::PingAll => "PING",
			Step::SendData => "DATA",
			Step::Shutdown => "SHUTDOWN",
		}
	}
}

/// How many park rounds the primary spends before giving up on a core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
	/// Waiting for a full destination mailbox to empty.
	pub send_rounds: u32,
	/// Waiting for acks after sending.
	pub ack_rounds: u32,
}

impl RetryBudget {
	pub const DEFAULT: RetryBudget = RetryBudget {
		send_rounds: 100_000,
		ack_rounds: 1_000_000,
	};

	/// Wait as long as it takes.
	pub const UNBOUNDED: RetryBudget = RetryBudget {
		send_rounds: u32::MAX,
		ack_rounds: u32::MAX,
	};
}

impl Default for RetryBudget {
	fn default() -> Self {
		Self::DEFAULT
	}
}

/// Result of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
	pub step: Step,
	/// Cores the step was addressed to.
	pub expected: CoreMask,
	/// Cores whose mailbox took the message.
	pub sent: CoreMask,
	/// Cores that answered with the right ack.
	pub acked: CoreMask,
}

impl StepOutcome {
	pub fn passed(&self) -> bool {
		self.acked == self.expected
	}
}

/// Outcomes of a whole plan, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
	/// Cores online when the plan started, primary included.
	pub online: CoreMask,
	outcomes: [Option<StepOutcome>; MAX_STEPS],
	len: usize,
	/// Steps past `MAX_STEPS` that never ran.
	skipped: usize,
}

impl Report {
	pub const fn new(online: CoreMask) -> Self {
		Self {
			online,
			outcomes: [None; MAX_STEPS],
			len: 0,
			skipped: 0,
		}
	}

	fn push(&mut self, outcome: StepOutcome) {
		if let Some(slot) = self.outcomes.get_mut(self.len) {
			*slot = Some(outcome);
			self.len += 1;
		}
	}

	pub fn outcomes(&self) -> impl Iterator<Item = &StepOutcome> {
		self.outcomes[..self.len].iter().flatten()
	}

	pub fn len(&self) -> usize {
		self.len
	}

	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	pub fn passed(&self) -> usize {
		self.outcomes().filter(|o| o.passed()).count()
	}

	pub fn skipped(&self) -> usize {
		self.skipped
	}

	/// A truncated plan never counts as passed.
	pub fn all_passed(&self) -> bool {
		self.skipped == 0 && self.passed() == self.len
	}
}

/// Everything the primary needs to drive a run.
#[derive(Debug, Clone, Copy)]
pub struct Setup<'p> {
	/// Role of each core, by id.  The primary's entry is ignored.
	pub roles: [Role; MAX_CORES],
	pub plan: &'p [Step],
	pub budget: RetryBudget,
}

impl Setup<'static> {
	/// Core 1 reads the keyboard, core 2 echoes it, core 3 only answers.
	pub const DEFAULT: Setup<'static> = Setup {
		roles: [Role::Responder, Role::Producer, Role::Consumer, Role::Responder],
		plan: DEFAULT_PLAN,
		budget: RetryBudget::DEFAULT,
	};
}

impl Setup<'_> {
	pub fn role(&self, core: CoreId) -> Role {
		self.roles[core.index()]
	}
}

/// Initialize the shared region, start every secondary at `entry`, and run
/// `setup.plan` against the ones that came up.
///
/// Must be called on the primary, before any other core touches the
/// shared region.
pub fn run_primary<F: Firmware>(
	core: &Core<'_>,
	firmware: &F,
	entry: F::Entry,
	setup: &Setup<'_>,
) -> Result<Report, BringUpError> {
	let shared = core.shared();
	shared.init();

	kprintln!(core, "\n=== Multi-Core IPC Test ===");
	kprintln!(core, "[Core {}] Starting secondary cores...", core.id());
	let online = smp::bring_up_secondaries(firmware, &shared, entry)?;

	kprintln!(core, "\n=== [TEST SUITE] Starting All Tests ===\n");
	let report = run_plan(core, online, &setup.roles, setup.plan, setup.budget);

	kprintln!(
		core,
		"\n=== [TEST SUITE] {} of {} steps passed ===",
		report.passed(),
		report.len()
	);
	Ok(report)
}

/// Run `plan` against the online secondaries and record each step.
pub fn run_plan(
	core: &Core<'_>,
	online: CoreMask,
	roles: &[Role; MAX_CORES],
	plan: &[Step],
	budget: RetryBudget,
) -> Report {
	let mut report = Report::new(online);
	let targets = online - CoreMask::of(core.id());

	if plan.len() > MAX_STEPS {
		report.skipped = plan.len() - MAX_STEPS;
		klog::warn!("scenario: plan has {} steps, only the first {} run", plan.len(), MAX_STEPS);
		kprintln!(core, "[SKIP] {} steps past the first {}", report.skipped, MAX_STEPS);
	}

	for &step in plan.iter().take(MAX_STEPS) {
		let outcome = match step {
			Step::PingAll | Step::SendData => broadcast(core, step, targets, budget),
			Step::Shutdown => shut_down(core, targets, roles, budget),
		};

		if outcome.passed() {
			kprintln!(
				core,
				"[PASS] {}: {} of {} cores acked",
				step.name(),
				outcome.acked.bits().count_ones(),
				outcome.expected.bits().count_ones()
			);
		} else {
			kprintln!(
				core,
				"[FAIL] {}: no ack from cores {:?}",
				step.name(),
				outcome.expected - outcome.acked
			);
		}
		report.push(outcome);
	}

	report
}

/// Send to all targets first, then gather the acks in whatever order
/// they come.
fn broadcast(core: &Core<'_>, step: Step, targets: CoreMask, budget: RetryBudget) -> StepOutcome {
	let mut outcome = StepOutcome {
		step,
		expected: targets,
		sent: CoreMask::empty(),
		acked: CoreMask::empty(),
	};

	for dest in targets.cores() {
		if send(core, dest, step.kind(), step.payload(dest), budget.send_rounds) {
			kprintln!(core, "[Core {}] -> Core {} {} sent", core.id(), dest, step.name());
			outcome.sent |= CoreMask::of(dest);
		}
	}

	collect_acks(core, step, &mut outcome, budget.ack_rounds);
	outcome
}

/// Stop the targets one by one, each acked before the next is told.
fn shut_down(core: &Core<'_>, targets: CoreMask, roles: &[Role; MAX_CORES], budget: RetryBudget) -> StepOutcome {
	let step = Step::Shutdown;
	let mut outcome = StepOutcome {
		step,
		expected: targets,
		sent: CoreMask::empty(),
		acked: CoreMask::empty(),
	};

	for phase in [Role::Producer, Role::Responder, Role::Consumer] {
		for dest in targets.cores().filter(|dest| roles[dest.index()] == phase) {
			if !send(core, dest, step.kind(), step.payload(dest), budget.send_rounds) {
				continue;
			}
			outcome.sent |= CoreMask::of(dest);
			collect_acks(core, step, &mut outcome, budget.ack_rounds);
		}
	}

	outcome
}

/// Post a message, retrying while the destination mailbox is full.
fn send(core: &Core<'_>, dest: CoreId, kind: MessageKind, payload: u32, rounds: u32) -> bool {
	let mut result = Ok(());
	smp::park_until_within(rounds, || {
		result = core.send(dest, kind, payload);
		!matches!(result, Err(IpcError::MailboxFull(_)))
	});

	match result {
		Ok(()) => true,
		Err(err) => {
			klog::warn!("core {}: {} to core {} not delivered: {}", core.id(), kind_name(kind), dest, err);
			false
		}
	}
}

fn kind_name(kind: MessageKind) -> &'static str {
	match kind {
		MessageKind::None => "NONE",
		MessageKind::Ping => "PING",
		MessageKind::Data => "DATA",
		MessageKind::Ack => "ACK",
		MessageKind::Shutdown => "SHUTDOWN",
	}
}

/// Take acks from our mailbox until every core in `outcome.sent` has
/// answered or the budget runs out.  Anything that is not the expected
/// ack is logged and dropped.
fn collect_acks(core: &Core<'_>, step: Step, outcome: &mut StepOutcome, rounds: u32) {
	smp::park_until_within(rounds, || {
		while let Ok(envelope) = core.receive() {
			core.clear();
			let sender = envelope.sender;
			let expected = ack_payload(sender, step.payload(sender));

			if envelope.kind == MessageKind::Ack
				&& outcome.sent.has(sender)
				&& !outcome.acked.has(sender)
				&& envelope.payload == expected
			{
				kprintln!(
					core,
					"[Core {}] <- ACK from Core {} | Data: {:#010X}",
					core.id(),
					sender,
					envelope.payload
				);
				outcome.acked |= CoreMask::of(sender);
			} else {
				klog::warn!(
					"core {}: unexpected {:?} {:#x} from core {}",
					core.id(),
					envelope.kind,
					envelope.payload,
					sender
				);
			}
		}
		outcome.acked.contains(outcome.sent)
	});
}
