//! TCP syslog 프레이밍
//!
//! - newline: 한 줄이 메시지 하나 (`\r\n`도 허용)
//! - octet-counting: `LEN SP MSG` (RFC 6587 3.4.1). 프레임이 숫자로 시작하지
//!   않으면 해당 프레임만 newline 방식으로 읽습니다.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// `LEN` 필드의 최대 자릿수
const MAX_LEN_DIGITS: usize = 10;

/// TCP syslog 프레이밍 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TcpFraming {
    /// 개행 문자로 메시지 구분 (기본값)
    #[default]
    NewlineDelimited,
    /// 길이 접두사 (`LEN SP MSG`)
    OctetCounting,
}

/// 스트림에서 프레임 하나를 읽어 `buf`에 담습니다.
///
/// 스트림이 끝났으면 `Ok(false)`를 반환합니다. 빈 줄은 건너뜁니다.
/// 프레임이 `max_size`를 넘으면 `InvalidData` 에러를 반환합니다.
pub async fn read_frame<R>(
    reader: &mut R,
    framing: TcpFraming,
    max_size: usize,
    buf: &mut Vec<u8>,
) -> io::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        buf.clear();

        if !skip_line_breaks(reader).await? {
            return Ok(false);
        }

        let starts_with_digit = match framing {
            TcpFraming::OctetCounting => {
                let peek = reader.fill_buf().await?;
                peek.first().is_some_and(u8::is_ascii_digit)
            }
            TcpFraming::NewlineDelimited => false,
        };

        if starts_with_digit {
            read_octet_counted(reader, max_size, buf).await?;
            return Ok(true);
        }

        if !read_line(reader, max_size, buf).await? {
            return Ok(false);
        }
        if !buf.is_empty() {
            return Ok(true);
        }
    }
}

/// 프레임 사이의 `\r`, `\n`을 소비합니다. EOF면 `false`.
async fn skip_line_breaks<R>(reader: &mut R) -> io::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(false);
        }
        let skip = available
            .iter()
            .take_while(|b| **b == b'\n' || **b == b'\r')
            .count();
        let exhausted = skip == available.len();
        reader.consume(skip);
        if !exhausted {
            return Ok(true);
        }
    }
}

async fn read_line<R>(reader: &mut R, max_size: usize, buf: &mut Vec<u8>) -> io::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    let limit = u64::try_from(max_size).unwrap_or(u64::MAX).saturating_add(1);
    let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
    if n == 0 {
        return Ok(false);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if buf.len() > max_size {
        return Err(too_large(buf.len(), max_size));
    }

    Ok(true)
}

async fn read_octet_counted<R>(
    reader: &mut R,
    max_size: usize,
    buf: &mut Vec<u8>,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut len_field = Vec::with_capacity(MAX_LEN_DIGITS + 1);
    (&mut *reader)
        .take(MAX_LEN_DIGITS as u64 + 1)
        .read_until(b' ', &mut len_field)
        .await?;

    if len_field.pop() != Some(b' ') || !len_field.iter().all(u8::is_ascii_digit) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "invalid octet count '{}'",
                String::from_utf8_lossy(&len_field)
            ),
        ));
    }

    let len: usize = std::str::from_utf8(&len_field)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "octet count overflow"))?;

    if len > max_size {
        return Err(too_large(len, max_size));
    }

    buf.resize(len, 0);
    reader.read_exact(buf).await?;
    Ok(())
}

fn too_large(len: usize, max_size: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("frame exceeds max size ({len} bytes, max: {max_size})"),
    )
}
