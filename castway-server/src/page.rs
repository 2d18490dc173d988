use castway_core::ServerUrls;

/// Landing page embedding the device server in an iframe, with the
/// gateway and device server addresses in the footer.
pub fn render_index(scrcpy: &ServerUrls, app_port: u16) -> String {
    let device_url = scrcpy.base_url();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <title>Remote Device Control</title>
  <style>
    body {{
      margin: 0;
      padding: 20px;
      font-family: Arial, sans-serif;
      background: #1a1a1a;
      color: #fff;
    }}
    .container {{
      max-width: 1200px;
      margin: 0 auto;
    }}
    h1 {{
      text-align: center;
      margin-bottom: 30px;
    }}
    .device-frame {{
      width: 100%;
      height: 80vh;
      border: none;
      border-radius: 8px;
      background: #000;
    }}
    .info {{
      text-align: center;
      margin-top: 20px;
      color: #888;
    }}
  </style>
</head>
<body>
  <div class="container">
    <h1>🎮 Remote Device Control</h1>
    <iframe
      class="device-frame"
      src="{device_url}"
      allow="autoplay"
    ></iframe>
    <div class="info">
      <p>Main App: http://localhost:{app_port}</p>
      <p>Device Server: {device_url}</p>
      <p>If the frame stays black, the device server is not reachable.</p>
    </div>
  </div>
</body>
</html>
"#
    )
}
