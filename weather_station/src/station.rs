use std::fmt;
use std::io::{self, Write};

use embedded_graphics::{pixelcolor::Rgb565, prelude::DrawTarget};
use embedded_hal::delay::DelayNs;
use log::*;

use crate::config::Settings;
use crate::headers::{skip_headers, HeaderError};
use crate::parser::{read_reading, ParseError};
use crate::presenter::Presenter;
use crate::reading::Reading;
use crate::request::send_request;
use crate::session::{Connector, Session, SessionError};

/// Why a cycle ended without a reading on screen.
#[derive(Debug)]
pub enum CycleError {
    Connect(SessionError),
    Request(io::Error),
    Headers(HeaderError),
    /// Only raised when status validation is enabled.
    Status(Option<u16>),
    Parse(ParseError),
}

impl CycleError {
    /// The exchange itself broke down, as opposed to a bad status or document.
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Connect(_) | Self::Request(_) | Self::Headers(_) => true,
            Self::Parse(e) => e.is_transport(),
            Self::Status(_) => false,
        }
    }
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(e) => write!(f, "{}", e),
            Self::Request(e) => write!(f, "sending request failed: {}", e),
            Self::Headers(e) => write!(f, "{}", e),
            Self::Status(Some(code)) => write!(f, "unexpected HTTP status {}", code),
            Self::Status(None) => write!(f, "response has no HTTP status line"),
            Self::Parse(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CycleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Connect(e) => Some(e),
            Self::Request(e) => Some(e),
            Self::Headers(e) => Some(e),
            Self::Status(_) => None,
            Self::Parse(e) => Some(e),
        }
    }
}

impl From<SessionError> for CycleError {
    fn from(e: SessionError) -> Self {
        Self::Connect(e)
    }
}

impl From<HeaderError> for CycleError {
    fn from(e: HeaderError) -> Self {
        Self::Headers(e)
    }
}

impl From<ParseError> for CycleError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

/// Runs the poll cycle: fetch, present, close, sleep.
pub struct Station<C: Connector, D, W> {
    settings: Settings,
    resource: String,
    session: Session<C>,
    presenter: Presenter,
    display: D,
    diagnostics: W,
}

impl<C, D, W> Station<C, D, W>
where
    C: Connector,
    D: DrawTarget<Color = Rgb565>,
    W: Write,
{
    pub fn new(settings: Settings, connector: C, display: D, diagnostics: W) -> Self {
        let session = Session::new(connector, settings.http.connect_timeout());
        let presenter = Presenter::new(&settings.openweather.city);
        let resource = settings.openweather.resource();
        Self {
            settings,
            resource,
            session,
            presenter,
            display,
            diagnostics,
        }
    }

    /// One cycle without the sleep. The session is closed on every path.
    pub fn run_cycle(&mut self) -> Result<Reading, CycleError> {
        let result = self.fetch().map(|reading| {
            self.presenter
                .present(&mut self.display, &mut self.diagnostics, &reading);
            reading
        });
        self.session.close();

        if let Err(e) = &result {
            error!("Weather cycle failed: {}", e);
        }
        result
    }

    /// One cycle followed by the poll interval sleep.
    pub fn tick<Dl: DelayNs>(&mut self, delay: &mut Dl) -> Result<Reading, CycleError> {
        let result = self.run_cycle();
        info!(
            "Waiting for next update ({} s)...",
            self.settings.schedule.interval_secs
        );
        delay.delay_ms(self.settings.schedule.interval_ms());
        result
    }

    fn fetch(&mut self) -> Result<Reading, CycleError> {
        let ow = &self.settings.openweather;
        let http = &self.settings.http;

        let stream = self.session.open(&ow.host, ow.port)?;
        send_request(stream.get_mut(), &ow.host, &self.resource).map_err(CycleError::Request)?;

        let head = skip_headers(stream, http.timeout())?;
        if http.validate_status && !head.is_success() {
            return Err(CycleError::Status(head.status));
        }

        let reading = read_reading(
            stream,
            http.timeout(),
            http.max_body_bytes,
            self.settings.reading.narrowing,
        )?;
        debug!("Parsed {:?}", reading);
        Ok(reading)
    }

    pub fn diagnostics(&self) -> &W {
        &self.diagnostics
    }

    pub fn connector(&self) -> &C {
        self.session.connector()
    }

    pub fn into_parts(self) -> (D, W) {
        (self.display, self.diagnostics)
    }
}
