use bytes::{Bytes, BytesMut};
use criterion::{Criterion, criterion_group, criterion_main};
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use sluice_http::codec::{RequestDecoder, ResponseEncoder};
use sluice_http::connection::HttpConnection;
use sluice_http::handler::make_handler;
use sluice_http::protocol::body::ReqBody;
use sluice_http::protocol::{Message, PayloadItem, PayloadSize, ResponseHead};
use std::error::Error;
use std::hint::black_box;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex, split};
use tokio::runtime::Runtime;
use tokio_util::codec::{Decoder, Encoder};

async fn echo(request: Request<ReqBody>) -> Result<Response<Full<Bytes>>, Box<dyn Error + Send + Sync>> {
    let body = request.into_body().collect().await?.to_bytes();
    Ok(Response::new(Full::new(body)))
}

fn bench_request_decoder(c: &mut Criterion) {
    let request = b"GET / HTTP/1.1\r\nHost: localhost\r\nAccept: */*\r\n\r\n";

    c.bench_function("decode_simple_request", |b| {
        b.iter(|| {
            let mut decoder = RequestDecoder::new();
            let mut bytes = BytesMut::from(&request[..]);
            black_box(decoder.decode(&mut bytes).unwrap());
        });
    });

    let mut chunked = BytesMut::from(&b"POST /upload HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n"[..]);
    for _ in 0..64 {
        chunked.extend_from_slice(b"400\r\n");
        chunked.extend_from_slice(&[b'a'; 1024]);
        chunked.extend_from_slice(b"\r\n");
    }
    chunked.extend_from_slice(b"0\r\n\r\n");
    let chunked = chunked.freeze();

    c.bench_function("decode_chunked_request_64k", |b| {
        b.iter(|| {
            let mut decoder = RequestDecoder::new();
            let mut bytes = BytesMut::from(&chunked[..]);
            while let Some(message) = decoder.decode(&mut bytes).unwrap() {
                if matches!(message, Message::Payload(PayloadItem::Eof)) {
                    break;
                }
                black_box(message);
            }
        });
    });
}

fn bench_response_encoder(c: &mut Criterion) {
    c.bench_function("encode_simple_response", |b| {
        b.iter(|| {
            let mut encoder = ResponseEncoder::new();
            let mut bytes = BytesMut::new();
            let mut head = ResponseHead::new(());
            *head.status_mut() = StatusCode::OK;
            encoder.encode(Message::<_, Bytes>::Header((head, PayloadSize::Length(12))), &mut bytes).unwrap();
            encoder.encode(Message::<(ResponseHead, PayloadSize)>::Payload(PayloadItem::Chunk(Bytes::from_static(b"Hello World!"))), &mut bytes).unwrap();
            encoder.encode(Message::<(ResponseHead, PayloadSize)>::Payload(PayloadItem::Eof), &mut bytes).unwrap();
            black_box(bytes);
        });
    });
}

fn bench_streaming_echo(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let handler = Arc::new(make_handler(echo));
    let body = "abc".repeat(100_000);
    let request = format!("POST /echo HTTP/1.1\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}", body.len());

    c.bench_function("echo_300k_body", |b| {
        b.to_async(&runtime).iter(|| {
            let handler = handler.clone();
            let request = request.clone();
            async move {
                let (server_io, client) = duplex(64 * 1024);
                let (reader, writer) = split(server_io);
                let server = tokio::spawn(HttpConnection::new(reader, writer).process(handler));

                let (mut client_reader, mut client_writer) = split(client);
                let write = async move { client_writer.write_all(request.as_bytes()).await.unwrap() };
                let read = async move {
                    let mut response = Vec::new();
                    client_reader.read_to_end(&mut response).await.unwrap();
                    response
                };
                let ((), response) = tokio::join!(write, read);
                server.await.unwrap().unwrap();
                black_box(response);
            }
        });
    });
}

criterion_group!(benches, bench_request_decoder, bench_response_encoder, bench_streaming_echo);
criterion_main!(benches);
