use std::io::{self, Write};

use log::*;

/// Writes a minimal `GET` request and flushes it. Nothing is read back.
pub fn send_request<W: Write>(writer: &mut W, host: &str, resource: &str) -> io::Result<()> {
    info!("GET {}", redact_appid(resource));
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        resource, host
    );
    writer.write_all(request.as_bytes())?;
    writer.flush()?;
    info!("Request sent");
    Ok(())
}

/// Masks the API key so it does not end up on the serial console.
fn redact_appid(resource: &str) -> String {
    match resource.find("appid=") {
        Some(start) => {
            let value_start = start + "appid=".len();
            let value_end = resource[value_start..]
                .find('&')
                .map_or(resource.len(), |i| value_start + i);
            format!("{}***{}", &resource[..value_start], &resource[value_end..])
        }
        None => resource.to_string(),
    }
}
