use alloc::boxed::Box;
use alloc::format;
use core::fmt;

use embedded_hal::serial::{Read, Write};
use tracing::{debug, info, warn};

use crate::commands::Command;
use crate::config::Timings;
use crate::driver::Zw101;
use crate::entities::{BinarySensor, Sensor, Switch, SwitchKind, TextSensor};
use crate::responses::{ConfirmationCode, IndexTable, Reply};
use crate::utils::{elapsed, Clock, Error};

/// `ControlBLN` function code that switches the ring off.
pub const LED_OFF: u8 = 4;

/// Security level used for automatic identification.
const AUTO_MATCH_SECURITY_LEVEL: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollState {
    Idle,
    WaitFinger,
    Capturing,
    WaitRemove,
    Merging,
    Storing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Idle,
    GetImage,
    GenChar,
    WaitRetry,
    DoSearch,
}

/// Whether the module is running one of its own automatic procedures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoMode {
    Inactive,
    /// Automatic enrollment, cancelled once `timeout_ms` has passed since `started`.
    Enroll { started: u32, timeout_ms: u32 },
    /// Automatic identification, no deadline.
    Match,
}

/// Fingerprint component: owns the module connection, runs the background search loop and the
/// enrollment procedure, and publishes results to whichever entities were registered.
///
/// Call [`setup`](Self::setup) once, then [`poll`](Self::poll) from the main loop. Each poll
/// performs at most one command exchange.
pub struct Zw101Component<TX, RX, CLK> {
    device: Zw101<TX, RX, CLK>,
    timings: Timings,

    fingerprint_sensor: Option<Box<dyn BinarySensor>>,
    match_score_sensor: Option<Box<dyn Sensor>>,
    match_id_sensor: Option<Box<dyn Sensor>>,
    status_sensor: Option<Box<dyn TextSensor>>,
    enroll_switch: Option<Box<dyn Switch>>,
    clear_switch: Option<Box<dyn Switch>>,

    enroll_state: EnrollState,
    enroll_sample_count: u8,
    enroll_last_action: u32,
    enroll_wait_since: u32,
    next_fingerprint_id: u16,
    library_capacity: u16,

    search_state: SearchState,
    search_retry_count: u8,
    search_last_action: u32,

    /// When the last match was published; the lock closes again after `match_hold_ms`.
    match_found_at: Option<u32>,

    setup_at: u32,
    led_off_sent: bool,
    auto_search_disabled: bool,
    auto_mode: AutoMode,
}

impl<TX, RX, CLK> fmt::Debug for Zw101Component<TX, RX, CLK> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Zw101Component")
            .field("enroll_state", &self.enroll_state)
            .field("search_state", &self.search_state)
            .field("next_fingerprint_id", &self.next_fingerprint_id)
            .field("library_capacity", &self.library_capacity)
            .field("auto_mode", &self.auto_mode)
            .field("auto_search_disabled", &self.auto_search_disabled)
            .finish()
    }
}

impl<TX, RX, CLK> Zw101Component<TX, RX, CLK>
where TX: Write<u8>,
      RX: Read<u8>,
      CLK: Clock
{
    pub fn new(device: Zw101<TX, RX, CLK>) -> Self {
        return Self::with_timings(device, Timings::default());
    }

    pub fn with_timings(device: Zw101<TX, RX, CLK>, timings: Timings) -> Self {
        Self {
            device,
            timings,
            fingerprint_sensor: None,
            match_score_sensor: None,
            match_id_sensor: None,
            status_sensor: None,
            enroll_switch: None,
            clear_switch: None,
            enroll_state: EnrollState::Idle,
            enroll_sample_count: 0,
            enroll_last_action: 0,
            enroll_wait_since: 0,
            next_fingerprint_id: 0,
            library_capacity: timings.library_capacity.max(1),
            search_state: SearchState::Idle,
            search_retry_count: 0,
            search_last_action: 0,
            match_found_at: None,
            setup_at: 0,
            led_off_sent: false,
            auto_search_disabled: false,
            auto_mode: AutoMode::Inactive,
        }
    }

    pub fn set_fingerprint_sensor(&mut self, sensor: Box<dyn BinarySensor>) {
        self.fingerprint_sensor = Some(sensor);
    }

    pub fn set_match_score_sensor(&mut self, sensor: Box<dyn Sensor>) {
        self.match_score_sensor = Some(sensor);
    }

    pub fn set_match_id_sensor(&mut self, sensor: Box<dyn Sensor>) {
        self.match_id_sensor = Some(sensor);
    }

    pub fn set_status_sensor(&mut self, sensor: Box<dyn TextSensor>) {
        self.status_sensor = Some(sensor);
    }

    pub fn set_enroll_switch(&mut self, switch: Box<dyn Switch>) {
        self.enroll_switch = Some(switch);
    }

    pub fn set_clear_switch(&mut self, switch: Box<dyn Switch>) {
        self.clear_switch = Some(switch);
    }

    pub fn device(&self) -> &Zw101<TX, RX, CLK> {
        return &self.device;
    }

    pub fn device_mut(&mut self) -> &mut Zw101<TX, RX, CLK> {
        return &mut self.device;
    }

    pub fn timings(&self) -> &Timings {
        return &self.timings;
    }

    pub fn enroll_state(&self) -> EnrollState {
        return self.enroll_state;
    }

    pub fn search_state(&self) -> SearchState {
        return self.search_state;
    }

    pub fn auto_mode(&self) -> AutoMode {
        return self.auto_mode;
    }

    pub fn library_capacity(&self) -> u16 {
        return self.library_capacity;
    }

    /// Slot the next enrollment will be stored into.
    pub fn next_fingerprint_id(&self) -> u16 {
        return self.next_fingerprint_id;
    }

    pub fn auto_search_enabled(&self) -> bool {
        return !self.auto_search_disabled;
    }

    pub fn setup(&mut self) {
        info!("Initializing ZW101 fingerprint module");
        let now = self.now();
        self.setup_at = now;
        self.search_last_action = now;

        if let Err(e) = self.read_fp_info() {
            warn!(error = %e, "module info unavailable");
        }
    }

    pub fn poll(&mut self) {
        let now = self.now();

        if !self.led_off_sent && elapsed(now, self.setup_at) > self.timings.led_off_delay_ms {
            self.led_off_sent = true;
            match self.set_rgb_led(LED_OFF, 0, 0) {
                Ok(()) => info!("LED turned off"),
                Err(e) => warn!(error = %e, "failed to turn LED off"),
            }
        }

        if let AutoMode::Enroll { started, timeout_ms } = self.auto_mode {
            if elapsed(now, started) >= timeout_ms {
                warn!("Auto mode timeout, cancelling");
                if let Err(e) = self.cancel_auto_mode() {
                    warn!(error = %e, "failed to cancel auto mode");
                }
            }
        }

        if let Some(found_at) = self.match_found_at {
            if elapsed(now, found_at) >= self.timings.match_hold_ms {
                self.match_found_at = None;
                if let Some(sensor) = self.fingerprint_sensor.as_mut() {
                    sensor.publish_state(false);
                }
            }
        }

        // No background search while enrolling.
        if self.enroll_state != EnrollState::Idle {
            self.process_enrollment(now);
            return;
        }

        if self.auto_mode != AutoMode::Inactive || self.auto_search_disabled {
            return;
        }

        self.process_search(now);
    }

    fn process_search(&mut self, now: u32) {
        match self.search_state {
            SearchState::Idle => {
                if elapsed(now, self.search_last_action) > self.timings.search_interval_ms {
                    self.search_state = SearchState::GetImage;
                    self.search_retry_count = 0;
                    self.search_last_action = now;
                }
            },

            SearchState::GetImage => {
                if self.command_succeeds(Command::GetImage) {
                    self.search_state = SearchState::GenChar;
                } else {
                    self.search_state = SearchState::WaitRetry;
                    self.search_last_action = now;
                }
            },

            SearchState::GenChar => {
                if self.command_succeeds(Command::GenChar { buffer: 1 }) {
                    self.search_state = SearchState::DoSearch;
                    return;
                }
                self.search_retry_count += 1;
                if self.search_retry_count >= self.timings.search_max_retries {
                    self.publish_status("No Valid Fingerprint");
                    self.search_state = SearchState::Idle;
                } else {
                    self.search_state = SearchState::WaitRetry;
                }
                self.search_last_action = now;
            },

            SearchState::WaitRetry => {
                if elapsed(now, self.search_last_action) > self.timings.search_retry_delay_ms {
                    self.search_state = SearchState::GetImage;
                }
            },

            SearchState::DoSearch => {
                self.search_library(now);
                self.search_state = SearchState::Idle;
                self.search_last_action = now;
            },
        }
    }

    fn search_library(&mut self, now: u32) {
        let capacity = self.library_capacity;
        let reply = match self.device.send_command(Command::Search {
            buffer: 1,
            start_page: 0,
            page_num: capacity,
        }) {
            Ok(reply) => reply,
            Err(e) => {
                debug!(error = %e, "search failed");
                return;
            },
        };

        match (reply.confirmation_code(), &reply) {
            (ConfirmationCode::Success, Reply::Search(result)) => match result.matched_page(capacity) {
                Some(page) => {
                    info!(page, score = result.match_score, "Match found");
                    if let Some(sensor) = self.fingerprint_sensor.as_mut() {
                        sensor.publish_state(true);
                    }
                    if let Some(sensor) = self.match_id_sensor.as_mut() {
                        sensor.publish_state(page as f32);
                    }
                    if let Some(sensor) = self.match_score_sensor.as_mut() {
                        sensor.publish_state(result.match_score as f32);
                    }
                    self.publish_status("Match Found");
                    self.match_found_at = Some(now);
                },
                None => {
                    debug!(page = result.match_page, "No match found");
                    self.publish_status("No Match");
                },
            },
            (ConfirmationCode::NotFound, _) => {
                debug!("Search returned: no match");
                self.publish_status("No Match");
            },
            (code, _) => debug!(?code, "search rejected"),
        }
    }

    fn process_enrollment(&mut self, now: u32) {
        match self.enroll_state {
            EnrollState::Idle => {},

            EnrollState::WaitFinger => {
                if elapsed(now, self.enroll_last_action) <= self.timings.enroll_poll_ms {
                    return;
                }
                self.enroll_last_action = now;

                if self.command_succeeds(Command::GetEnrollImage) {
                    self.enroll_state = EnrollState::Capturing;
                    info!(
                        sample = self.enroll_sample_count + 1,
                        of = self.enroll_samples(),
                        "Finger detected, capturing sample"
                    );
                } else if elapsed(now, self.enroll_wait_since) > self.timings.enroll_timeout_ms {
                    warn!("Enrollment timed out waiting for a finger");
                    self.publish_status("Enroll Timeout");
                    self.enroll_state = EnrollState::Idle;
                }
            },

            EnrollState::Capturing => {
                let buffer = self.enroll_sample_count + 1;
                if !self.command_succeeds(Command::GenChar { buffer }) {
                    self.enroll_state = EnrollState::WaitFinger;
                    return;
                }
                self.enroll_sample_count += 1;
                info!(sample = self.enroll_sample_count, "Sample captured");

                if self.enroll_sample_count >= self.enroll_samples() {
                    self.enroll_state = EnrollState::Merging;
                } else {
                    self.enroll_state = EnrollState::WaitRemove;
                    self.enroll_last_action = now;
                }
            },

            EnrollState::WaitRemove => {
                if elapsed(now, self.enroll_last_action) > self.timings.enroll_remove_delay_ms {
                    info!(
                        sample = self.enroll_sample_count,
                        of = self.enroll_samples(),
                        "Remove finger and place again"
                    );
                    self.enroll_state = EnrollState::WaitFinger;
                    self.enroll_last_action = now;
                    self.enroll_wait_since = now;
                }
            },

            EnrollState::Merging => {
                if self.command_succeeds(Command::RegModel) {
                    self.enroll_state = EnrollState::Storing;
                } else {
                    self.publish_status("Enroll Failed - Merge");
                    self.enroll_state = EnrollState::Idle;
                }
            },

            EnrollState::Storing => {
                let id = self.next_fingerprint_id;
                if self.command_succeeds(Command::StoreChar { buffer: 1, page: id }) {
                    info!(id, "Fingerprint enrolled");
                    self.publish_status(&format!("Enroll Success (ID: {})", id));
                    self.next_fingerprint_id = if id + 1 >= self.library_capacity { 0 } else { id + 1 };
                    info!(id = self.next_fingerprint_id, "Next fingerprint slot");
                } else {
                    self.publish_status("Enroll Failed - Store");
                }
                self.enroll_state = EnrollState::Idle;
            },
        }
    }

    /// Starts the enrollment procedure; it then advances on each [`poll`](Self::poll).
    pub fn register_fingerprint(&mut self) -> Result<(), Error> {
        if self.enroll_state != EnrollState::Idle {
            warn!("Enrollment already in progress");
            return Err(Error::Busy);
        }

        self.publish_status("Enrolling...");
        info!(samples = self.enroll_samples(), "Starting fingerprint enrollment, place finger");

        let now = self.now();
        self.enroll_state = EnrollState::WaitFinger;
        self.enroll_sample_count = 0;
        self.enroll_last_action = now;
        self.enroll_wait_since = now;
        return Ok(());
    }

    pub fn clear_fingerprint_library(&mut self) -> Result<(), Error> {
        info!("Clearing fingerprint library");
        self.publish_status("Clearing Library...");

        match self.expect_success(Command::Empty) {
            Ok(_) => {
                self.publish_status("Library Cleared");
                info!("Library cleared");
                self.next_fingerprint_id = 0;
                return Ok(());
            },
            Err(e) => {
                warn!(error = %e, "Library clear failed");
                self.publish_status("Clear Failed");
                return Err(e);
            },
        }
    }

    /// Reads the library capacity and the number of stored templates. The next enrollment slot
    /// follows the stored count.
    pub fn read_fp_info(&mut self) -> Result<(), Error> {
        match self.expect_success(Command::ReadSysPara) {
            Ok(Reply::ReadSysPara(result)) => {
                let size = result.system_parameters.finger_library_size;
                if size > 0 {
                    self.library_capacity = size;
                }
                info!(capacity = size, "Library capacity");
            },
            Ok(_) => warn!("unexpected reply to ReadSysPara"),
            Err(e) => warn!(error = %e, "failed to read system parameters"),
        }

        match self.template_count() {
            Ok(count) => {
                self.next_fingerprint_id = if count >= self.library_capacity { 0 } else { count };
                info!(
                    registered = count,
                    capacity = self.library_capacity,
                    next_id = self.next_fingerprint_id,
                    "Module info"
                );
                let status = format!("Ready (Enrolled: {}/{})", count, self.library_capacity);
                self.publish_status(&status);
                return Ok(());
            },
            Err(e) => {
                warn!(error = %e, "Failed to read template count, using ID=0");
                self.next_fingerprint_id = 0;
                return Err(e);
            },
        }
    }

    pub fn read_valid_template_count(&mut self) -> Result<u16, Error> {
        match self.template_count() {
            Ok(count) => {
                info!(count, "Valid template count");
                self.publish_status(&format!("Templates: {}", count));
                return Ok(count);
            },
            Err(e) => {
                warn!(error = %e, "Failed to read valid template count");
                return Err(e);
            },
        }
    }

    /// Reads which slots of one index page (256 slots) hold a template.
    pub fn read_index_table(&mut self, index_page: u8) -> Result<IndexTable, Error> {
        return match self.expect_success(Command::ReadIndexTable { index_page })? {
            Reply::ReadIndexTable(result) => Ok(result.index_table),
            reply => Err(Error::Rejected(reply.confirmation_code().as_byte())),
        };
    }

    pub fn handshake(&mut self) -> Result<(), Error> {
        match self.expect_success(Command::HandShake) {
            Ok(_) => {
                info!("Handshake successful");
                self.publish_status("Module Online");
                return Ok(());
            },
            Err(e) => {
                warn!(error = %e, "Handshake failed");
                self.publish_status("Module Offline");
                return Err(e);
            },
        }
    }

    pub fn delete_fingerprint(&mut self, id: u16) -> Result<(), Error> {
        match self.expect_success(Command::DeletChar { page: id, count: 1 }) {
            Ok(_) => {
                info!(id, "Fingerprint deleted");
                self.publish_status(&format!("Deleted ID: {}", id));
                return Ok(());
            },
            Err(e) => {
                warn!(id, error = %e, "Failed to delete fingerprint");
                return Err(e);
            },
        }
    }

    /// Drives the LED ring. See [`Command::ControlBLN`] for the mode and colour codes;
    /// `brightness` is the end colour / duty byte.
    pub fn set_rgb_led(&mut self, mode: u8, color: u8, brightness: u8) -> Result<(), Error> {
        self.device.send(Command::ControlBLN {
            function: mode,
            start_color: color,
            end_color: brightness,
            loops: 0,
            cycle: 0x0F,
        })?;
        info!(mode, color, brightness, "RGB LED set");
        return Ok(());
    }

    /// Puts the module to sleep and stops the background search.
    pub fn enter_sleep_mode(&mut self) -> Result<(), Error> {
        match self.expect_success(Command::Sleep) {
            Ok(_) => {
                self.auto_search_disabled = true;
                info!("Module entered sleep mode");
                self.publish_status("Sleep Mode");
                return Ok(());
            },
            Err(e) => {
                warn!(error = %e, "Failed to enter sleep mode");
                return Err(e);
            },
        }
    }

    /// Hands enrollment over to the module. The mode is cancelled after `timeout_sec` seconds.
    /// The module's own timeout travels as milliseconds in a 16-bit field and saturates at
    /// 65535; the cancellation deadline does not.
    pub fn auto_enroll_mode(&mut self, timeout_sec: u16) -> Result<(), Error> {
        if self.auto_mode != AutoMode::Inactive {
            warn!("Auto mode already active");
            return Err(Error::Busy);
        }

        let timeout_ms = timeout_sec as u32 * 1000;
        let wire_timeout_ms = timeout_ms.min(u16::MAX as u32) as u16;
        self.device.send(Command::AutoEnroll { timeout_ms: wire_timeout_ms })?;

        self.auto_mode = AutoMode::Enroll { started: self.now(), timeout_ms };
        info!(timeout_sec, "Auto enroll mode activated");
        self.publish_status("Auto Enroll Mode");
        return Ok(());
    }

    pub fn auto_match_mode(&mut self) -> Result<(), Error> {
        if self.auto_mode != AutoMode::Inactive {
            warn!("Auto mode already active");
            return Err(Error::Busy);
        }

        self.device.send(Command::AutoIdentify {
            buffer: 2,
            start_page: 0,
            page_num: self.library_capacity,
            security_level: AUTO_MATCH_SECURITY_LEVEL,
        })?;

        self.auto_mode = AutoMode::Match;
        info!("Auto match mode activated");
        self.publish_status("Auto Match Mode");
        return Ok(());
    }

    pub fn cancel_auto_mode(&mut self) -> Result<(), Error> {
        if self.auto_mode == AutoMode::Inactive {
            return Ok(());
        }

        self.device.send(Command::Cancel)?;
        self.auto_mode = AutoMode::Inactive;
        info!("Auto mode cancelled");
        self.publish_status("Auto Mode Cancelled");
        return Ok(());
    }

    /// Stops the background search without putting the module to sleep.
    pub fn disable_auto_search(&mut self) {
        self.auto_search_disabled = true;
        info!("Auto search disabled");
    }

    pub fn enable_auto_search(&mut self) {
        self.auto_search_disabled = false;
        info!("Auto search enabled");
    }

    /// Handles a state write on one of the switches. Turning a switch on runs its action; the
    /// switch then reports itself off again.
    pub fn write_switch(&mut self, kind: SwitchKind, state: bool) {
        if !state {
            return;
        }

        let result = match kind {
            SwitchKind::Enroll => self.register_fingerprint(),
            SwitchKind::Clear => self.clear_fingerprint_library(),
        };
        if let Err(e) = result {
            warn!(?kind, error = %e, "switch action failed");
        }

        let switch = match kind {
            SwitchKind::Enroll => self.enroll_switch.as_mut(),
            SwitchKind::Clear => self.clear_switch.as_mut(),
        };
        if let Some(switch) = switch {
            switch.publish_state(false);
        }
    }

    fn enroll_samples(&self) -> u8 {
        return self.timings.enroll_samples.max(1);
    }

    fn now(&self) -> u32 {
        return self.device.clock().now_ms();
    }

    fn publish_status(&mut self, status: &str) {
        if let Some(sensor) = self.status_sensor.as_mut() {
            sensor.publish_state(status);
        }
    }

    fn template_count(&mut self) -> Result<u16, Error> {
        return match self.expect_success(Command::ValidTempleteNum)? {
            Reply::ValidTempleteNum(result) => Ok(result.template_num),
            reply => Err(Error::Rejected(reply.confirmation_code().as_byte())),
        };
    }

    fn command_succeeds(&mut self, cmd: Command) -> bool {
        return match self.expect_success(cmd) {
            Ok(_) => true,
            Err(e) => {
                debug!(command = ?cmd, error = %e, "command failed");
                false
            },
        };
    }

    fn expect_success(&mut self, cmd: Command) -> Result<Reply, Error> {
        let reply = self.device.send_command(cmd)?;
        if !reply.is_success() {
            return Err(Error::Rejected(reply.confirmation_code().as_byte()));
        }
        return Ok(reply);
    }
}
